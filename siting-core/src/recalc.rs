//! Bulk recalculation of every stored site's score record.
//!
//! The weight vector is snapshotted once per run. Scores are computed in
//! parallel, then written one record at a time so a cancellation request
//! takes effect between sites and never leaves a partial record behind.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::score::{Clock, ComputationError, ScoreRecord, score_site};
use crate::site::{Site, SiteId};
use crate::store::{ScoreStore, SiteStore, StoreError, WeightParameterStore};
use crate::weights::{WeightError, WeightStore, WeightUpdateError, WeightVector};

/// Why one site was not rescored.
#[derive(Debug, Error)]
pub enum RecalcFailure {
    /// The site's data could not be scored.
    #[error(transparent)]
    Computation(#[from] ComputationError),
    /// Reading the site or writing its record failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A site that was not rescored.
#[derive(Debug, Error)]
#[error("site {site_id}: {reason}")]
pub struct SiteFailure {
    /// Affected site.
    pub site_id: SiteId,
    /// What went wrong.
    #[source]
    pub reason: RecalcFailure,
}

/// Outcome of [`recalculate_all`].
#[derive(Debug)]
pub struct RecalcReport {
    /// Snapshot applied to every written record.
    pub weights: WeightVector,
    /// Records written.
    pub updated: usize,
    /// Sites that were not rescored, ordered by key.
    pub failures: Vec<SiteFailure>,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

/// Serialisable digest of a [`RecalcReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalcSummary {
    /// Snapshot applied to every written record.
    pub weights: WeightVector,
    /// Records written.
    pub updated: usize,
    /// Rendered failures.
    pub failures: Vec<String>,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

impl From<&RecalcReport> for RecalcSummary {
    fn from(report: &RecalcReport) -> Self {
        Self {
            weights: report.weights,
            updated: report.updated,
            failures: report.failures.iter().map(ToString::to_string).collect(),
            cancelled: report.cancelled,
        }
    }
}

/// A recalculation that could not run at all.
#[derive(Debug, Error)]
pub enum RecalcError {
    /// The weights could not be applied.
    #[error(transparent)]
    Weights(#[from] WeightUpdateError),
    /// The stored sites could not be listed.
    #[error("failed to list sites: {0}")]
    Listing(#[source] StoreError),
}

impl From<WeightError> for RecalcError {
    fn from(err: WeightError) -> Self {
        Self::Weights(WeightUpdateError::Invalid(err))
    }
}

fn load_failure(site_id: SiteId, err: StoreError) -> SiteFailure {
    let reason = match err {
        StoreError::MalformedField {
            site_id: id,
            field,
            reason,
        } => RecalcFailure::Computation(ComputationError::Unreadable {
            site_id: id,
            field,
            reason,
        }),
        other => RecalcFailure::Store(other),
    };
    SiteFailure { site_id, reason }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Acquire))
}

/// Rescore every stored site with `weights`.
///
/// Sites that cannot be read or scored are reported in
/// [`RecalcReport::failures`]; the rest are still written. When `cancel` is
/// set, the run stops before the next write.
///
/// # Errors
/// [`RecalcError::Weights`] when `weights` is invalid and
/// [`RecalcError::Listing`] when the site keys cannot be read.
pub fn recalculate_all<S>(
    store: &mut S,
    weights: &WeightVector,
    clock: &dyn Clock,
    cancel: Option<&AtomicBool>,
) -> Result<RecalcReport, RecalcError>
where
    S: SiteStore + ScoreStore + ?Sized,
{
    weights.validate()?;
    let snapshot = *weights;
    let site_ids = store.site_ids().map_err(RecalcError::Listing)?;

    let mut failures = Vec::new();
    let mut sites: Vec<Site> = Vec::with_capacity(site_ids.len());
    for site_id in site_ids {
        match store.site(site_id) {
            Ok(site) => sites.push(site),
            Err(err) => failures.push(load_failure(site_id, err)),
        }
    }

    let computed: Vec<(SiteId, Result<ScoreRecord, ComputationError>)> = sites
        .par_iter()
        .map(|site| (site.site_id, score_site(site, &snapshot, clock)))
        .collect();

    let mut updated = 0;
    let mut cancelled = false;
    for (site_id, result) in computed {
        if is_cancelled(cancel) {
            cancelled = true;
            break;
        }
        let outcome = result
            .map_err(RecalcFailure::from)
            .and_then(|record| store.upsert_score(&record).map_err(RecalcFailure::from));
        match outcome {
            Ok(()) => updated += 1,
            Err(reason) => failures.push(SiteFailure { site_id, reason }),
        }
    }

    failures.sort_by_key(|failure| failure.site_id);
    for failure in &failures {
        log::warn!("recalculation skipped {failure}");
    }
    if cancelled {
        log::info!("recalculation cancelled after {updated} records");
    } else {
        log::info!(
            "recalculated {updated} records with {} failures",
            failures.len()
        );
    }
    Ok(RecalcReport {
        weights: snapshot,
        updated,
        failures,
        cancelled,
    })
}

/// Activate `candidate`, persist it and rescore every site with it.
///
/// # Errors
/// See [`WeightStore::set_and_persist`] and [`recalculate_all`]. Nothing is
/// rescored when the weights are rejected.
pub fn apply_weights<S>(
    weight_store: &WeightStore,
    store: &mut S,
    candidate: WeightVector,
    clock: &dyn Clock,
    cancel: Option<&AtomicBool>,
) -> Result<RecalcReport, RecalcError>
where
    S: SiteStore + ScoreStore + WeightParameterStore + ?Sized,
{
    weight_store.set_and_persist(candidate, store)?;
    recalculate_all(store, &candidate, clock, cancel)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{FixedClock, MemoryStore, sample_site};
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::with_sites((1..=6).map(sample_site))
    }

    #[rstest]
    fn rescoring_twice_is_idempotent(mut store: MemoryStore) {
        let clock = FixedClock::default();
        let first = recalculate_all(&mut store, &WeightVector::DEFAULT, &clock, None)
            .expect("recalculation runs");
        let snapshot = store.scores();
        let second = recalculate_all(&mut store, &WeightVector::DEFAULT, &clock, None)
            .expect("recalculation runs");
        assert_eq!(first.updated, 6);
        assert_eq!(second.updated, 6);
        assert_eq!(store.scores(), snapshot);
    }

    #[rstest]
    fn malformed_sites_are_reported_not_skipped(mut store: MemoryStore) {
        store.corrupt_field(4, "slope_degrees", "text 'steep'");
        let report = recalculate_all(&mut store, &WeightVector::DEFAULT, &FixedClock::default(), None)
            .expect("recalculation runs");
        assert_eq!(report.updated, 5);
        let failed: Vec<_> = report.failures.iter().map(|f| f.site_id).collect();
        assert_eq!(failed, [4]);
        assert!(matches!(
            report.failures.first().map(|f| &f.reason),
            Some(RecalcFailure::Computation(ComputationError::Unreadable { .. }))
        ));
    }

    #[rstest]
    fn write_failures_are_per_site(mut store: MemoryStore) {
        store.fail_score_writes_for(2);
        let report = recalculate_all(&mut store, &WeightVector::DEFAULT, &FixedClock::default(), None)
            .expect("recalculation runs");
        assert_eq!(report.updated, 5);
        assert!(matches!(
            report.failures.first().map(|f| &f.reason),
            Some(RecalcFailure::Store(_))
        ));
        assert!(store.score(2).expect("read").is_none());
    }

    #[rstest]
    fn cancellation_stops_between_writes(mut store: MemoryStore) {
        let flag = Arc::new(AtomicBool::new(false));
        store.trip_after_writes(Arc::clone(&flag), 2);
        let report = recalculate_all(
            &mut store,
            &WeightVector::DEFAULT,
            &FixedClock::default(),
            Some(&flag),
        )
        .expect("recalculation runs");
        assert!(report.cancelled);
        assert_eq!(report.updated, 2);
        assert_eq!(store.scores().len(), 2);
    }

    #[rstest]
    fn invalid_weights_abort_before_any_write(mut store: MemoryStore) {
        let weights = WeightVector {
            infra: 0.06,
            ..WeightVector::DEFAULT
        };
        let err = recalculate_all(&mut store, &weights, &FixedClock::default(), None)
            .expect_err("weights are invalid");
        assert!(matches!(err, RecalcError::Weights(_)));
        assert!(store.scores().is_empty());
    }

    #[rstest]
    fn apply_weights_persists_and_rescores(mut store: MemoryStore) {
        let weight_store = WeightStore::new();
        let flat = WeightVector::new(0.2, 0.2, 0.2, 0.2, 0.2).expect("valid");
        let report = apply_weights(&weight_store, &mut store, flat, &FixedClock::default(), None)
            .expect("applies");
        assert_eq!(report.weights, flat);
        assert_eq!(weight_store.get_weights(), flat);
        let record = store.score(1).expect("read").expect("scored");
        assert_eq!(record.weights_snapshot, flat);
        assert_eq!(record.total_score, record.recompute_total());
    }
}
