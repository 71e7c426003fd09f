//! Transactional bulk upload of site drafts.
//!
//! Every draft is validated before the database is touched. Valid batches
//! are upserted and scored inside a single transaction; if any write or
//! score fails the transaction is dropped and nothing is kept.

use rusqlite::Error as SqliteError;
use serde::Serialize;
use siting_core::{
    ComputationError, SiteDraft, SiteId, SiteValidationError, StoreError, WeightError,
    WeightVector, score_site,
};
use thiserror::Error;

use crate::sqlite::{SqliteSiteStore, upsert_score_row, upsert_site_row};

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Number of sites upserted and scored.
    pub processed: usize,
    /// Weights used to score the batch.
    pub weights: WeightVector,
}

/// Errors raised while ingesting a batch of drafts.
#[derive(Debug, Error)]
pub enum IngestError {
    /// One or more drafts failed validation; nothing was written.
    #[error("{} of {total} rows failed validation", .rejected.len())]
    Invalid {
        /// Number of drafts submitted.
        total: usize,
        /// Every rejected draft with its problems.
        rejected: Vec<SiteValidationError>,
    },
    /// The scoring weights are unusable.
    #[error("ingest weights are invalid: {0}")]
    Weights(#[from] WeightError),
    /// Opening the transaction failed.
    #[error("failed to begin ingest transaction")]
    BeginTransaction(#[source] SqliteError),
    /// Writing a site row failed.
    #[error("failed to upsert site {site_id}")]
    Upsert {
        /// Site being written.
        site_id: SiteId,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Scoring an upserted site failed.
    #[error("failed to score uploaded site: {0}")]
    Scoring(#[from] ComputationError),
    /// Writing a score record failed.
    #[error("failed to store score for site {site_id}")]
    StoreScore {
        /// Site being scored.
        site_id: SiteId,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
    /// Committing the transaction failed.
    #[error("failed to commit ingest transaction")]
    Commit(#[source] SqliteError),
}

/// Upsert and score `drafts` as one all-or-nothing batch.
///
/// # Errors
/// [`IngestError::Invalid`] lists every rejected draft when validation fails;
/// other variants report the first write or scoring failure, after which the
/// transaction has been rolled back.
pub fn ingest_sites(
    store: &mut SqliteSiteStore,
    drafts: Vec<SiteDraft>,
    weights: &WeightVector,
) -> Result<IngestSummary, IngestError> {
    weights.validate()?;

    let total = drafts.len();
    let mut sites = Vec::with_capacity(total);
    let mut rejected = Vec::new();
    for draft in drafts {
        match draft.validate() {
            Ok(site) => sites.push(site),
            Err(err) => rejected.push(err),
        }
    }
    if !rejected.is_empty() {
        log::warn!("rejecting upload: {} of {total} rows invalid", rejected.len());
        return Err(IngestError::Invalid { total, rejected });
    }

    let clock = store.shared_clock();
    let now = clock.now();
    let transaction = store
        .transaction()
        .map_err(IngestError::BeginTransaction)?;
    for site in &sites {
        upsert_site_row(&transaction, site, now).map_err(|source| IngestError::Upsert {
            site_id: site.site_id,
            source,
        })?;
        let record = score_site(site, weights, clock.as_ref())?;
        upsert_score_row(&transaction, &record).map_err(|source| IngestError::StoreScore {
            site_id: site.site_id,
            source,
        })?;
    }
    transaction.commit().map_err(IngestError::Commit)?;

    log::info!("ingested and scored {} sites", sites.len());
    Ok(IngestSummary {
        processed: sites.len(),
        weights: *weights,
    })
}
