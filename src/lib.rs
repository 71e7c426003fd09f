//! Facade crate for the solar siting engine.
//!
//! This crate re-exports the core domain types and exposes the SQLite store
//! and CSV adapters behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use siting_core::{
    Aggregates, Clock, ComputationError, FilterError, FilterSpec, QueryError, QueryOutcome,
    QueryParams, RecalcReport, ScoreRecord, Site, SiteDraft, SiteId, SiteQuery, SiteScoreView,
    StatisticsSummary, SubScores, SystemClock, WeightError, WeightStore, WeightVector,
    apply_weights, compile_filters, execute_query, recalculate_all, score_site,
};

#[cfg(feature = "store-sqlite")]
pub use siting_data::{
    CsvError, IngestError, IngestSummary, PersistError, SiteDetail, SqliteSiteStore, ingest_sites,
    read_site_drafts, write_rows_csv,
};
