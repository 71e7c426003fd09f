//! Persistence and file adapters for the solar siting engine.
//!
//! Responsibilities:
//! - Store sites, score records and analysis parameters in SQLite.
//! - Upload CSV batches transactionally and export query results as CSV.
//!
//! Boundaries:
//! - Do not encode scoring or filtering rules (live in `siting-core`).
//! - Touch the filesystem through capability handles only.
//!
//! Invariants:
//! - An upload either stores and scores every row or changes nothing.
//! - No global mutable state.

#![forbid(unsafe_code)]

mod csv_file;
mod fs;
mod ingest;
mod sqlite;

pub use csv_file::{
    CsvError, EXPORT_FILE_NAME, read_site_drafts, read_site_drafts_from, write_export_file,
    write_rows_csv,
};
pub use fs::file_is_file;
pub use ingest::{IngestError, IngestSummary, ingest_sites};
pub use sqlite::{PersistError, SiteDetail, SqliteSiteStore};
