//! Core engine for scoring candidate solar-farm sites.
//!
//! The crate covers the deterministic parts of the system: site validation,
//! normalisation of raw measurements, the active weight vector, weighted
//! scoring, bulk recalculation, the filter token compiler and in-memory
//! query execution. Persistence is reached only through the traits in
//! [`store`].

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod filter;
pub mod normalize;
pub mod query;
pub mod recalc;
pub mod score;
pub mod site;
pub mod store;
pub mod summary;
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;
pub mod weights;

pub use filter::{
    Column, FilterError, FilterOp, FilterSpec, SITE_SCHEMA, SITE_SCORE_SCHEMA, Scalar, Schema,
    compile_filters,
};
pub use normalize::{
    Factor, normalize_area, normalize_grid, normalize_infra, normalize_slope, normalize_solar,
};
pub use query::{
    Aggregates, Direction, FactorAverages, Page, QueryError, QueryOutcome, QueryParams,
    SiteQuery, SiteScoreRow, SiteScoreView, SortOrder, execute_query,
};
pub use recalc::{
    RecalcError, RecalcFailure, RecalcReport, RecalcSummary, SiteFailure, apply_weights,
    recalculate_all,
};
pub use score::{
    Clock, ComputationError, ScoreRecord, SubScores, SystemClock, round2, score_site,
};
pub use site::{FieldProblem, KNOWN_LAND_TYPES, MIN_AREA_SQM, Site, SiteDraft, SiteId, SiteValidationError};
pub use store::{ScoreStore, SiteScoreSource, SiteStore, StoreError, WeightParameterStore};
pub use summary::{Kpi, ScoringSystemEntry, SiteData, StatisticsSummary};
pub use weights::{WeightComponent, WeightError, WeightStore, WeightUpdateError, WeightVector};
