//! Persistence seams consumed by the engine.
//!
//! The engine never talks to a database directly. Sites, score records and
//! weight parameters flow through these traits, which `siting-data`
//! implements on SQLite and [`crate::test_support::MemoryStore`] implements in
//! memory.

use std::error::Error as StdError;

use thiserror::Error;

use crate::query::SiteScoreRow;
use crate::score::ScoreRecord;
use crate::site::{Site, SiteId};

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No site exists with the requested key.
    #[error("no such site: {site_id}")]
    NotFound {
        /// Requested key.
        site_id: SiteId,
    },
    /// A stored column could not be decoded into the domain type.
    #[error("site {site_id}: column {field} is malformed: {reason}")]
    MalformedField {
        /// Affected site.
        site_id: SiteId,
        /// Offending column.
        field: String,
        /// What was found instead.
        reason: String,
    },
    /// The backing store failed.
    #[error("store operation {operation} failed: {source}")]
    Backend {
        /// Operation that failed, e.g. `upsert site`.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a backend failure.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Upsert and lookup of candidate sites keyed by [`SiteId`].
pub trait SiteStore {
    /// Insert `site` or replace the stored site with the same key.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn upsert_site(&mut self, site: &Site) -> Result<(), StoreError>;

    /// Fetch one site.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for unknown keys and
    /// [`StoreError::MalformedField`] when a stored column cannot be decoded.
    fn site(&self, site_id: SiteId) -> Result<Site, StoreError>;

    /// Keys of every stored site in ascending order.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the listing fails.
    fn site_ids(&self) -> Result<Vec<SiteId>, StoreError>;
}

/// Storage of the latest [`ScoreRecord`] per site.
pub trait ScoreStore {
    /// Insert or replace the record for `record.site_id`.
    ///
    /// The write must be all-or-nothing for the record.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn upsert_score(&mut self, record: &ScoreRecord) -> Result<(), StoreError>;

    /// Latest record for `site_id`, if one was stored.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the read fails.
    fn score(&self, site_id: SiteId) -> Result<Option<ScoreRecord>, StoreError>;
}

/// Named numeric analysis parameters, updated or created by name.
pub trait WeightParameterStore {
    /// Update or create each `(name, value)` parameter.
    ///
    /// # Errors
    /// Returns [`StoreError`] when any write fails; implementations should
    /// leave earlier parameters untouched in that case.
    fn write_parameters(&mut self, parameters: &[(&'static str, f64)]) -> Result<(), StoreError>;

    /// Every stored parameter.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the read fails.
    fn read_parameters(&self) -> Result<Vec<(String, f64)>, StoreError>;
}

/// Rows of the site/score join that queries operate on.
pub trait SiteScoreSource {
    /// Every site that has a score record, joined with that record.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the read fails.
    fn site_score_rows(&self) -> Result<Vec<SiteScoreRow>, StoreError>;
}
