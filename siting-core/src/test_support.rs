//! Test-only, in-memory store implementation and deterministic fixtures used
//! by unit and behaviour tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::query::SiteScoreRow;
use crate::score::{Clock, ScoreRecord, SubScores, round2};
use crate::site::{KNOWN_LAND_TYPES, Site, SiteDraft, SiteId};
use crate::store::{ScoreStore, SiteScoreSource, SiteStore, StoreError, WeightParameterStore};
use crate::weights::WeightVector;

/// 2024-01-01T00:00:00Z.
const FIXED_EPOCH_SECONDS: i64 = 1_704_067_200;

/// [`Clock`] that always reports the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(DateTime::from_timestamp(FIXED_EPOCH_SECONDS, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone)]
struct StoredSite {
    site: Site,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Simple failure used to exercise backend error paths.
#[derive(Debug, thiserror::Error)]
#[error("injected failure")]
pub struct InjectedFailure;

/// In-memory store implementing every engine store trait.
///
/// Beyond plain storage it can corrupt fields, fail selected writes and trip
/// a cancellation flag, so error paths can be driven deterministically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sites: BTreeMap<SiteId, StoredSite>,
    scores: BTreeMap<SiteId, ScoreRecord>,
    parameters: BTreeMap<String, f64>,
    corrupted: BTreeMap<SiteId, (String, String)>,
    failing_score_writes: BTreeSet<SiteId>,
    fail_parameter_writes: bool,
    trip: Option<(Arc<AtomicBool>, usize)>,
    score_writes: usize,
}

impl MemoryStore {
    /// Create a store holding `sites`.
    pub fn with_sites<I>(sites: I) -> Self
    where
        I: IntoIterator<Item = Site>,
    {
        let mut store = Self::default();
        for site in sites {
            store.insert(site);
        }
        store
    }

    fn insert(&mut self, site: Site) {
        let now = FixedClock::default().now();
        let created_at = self.sites.get(&site.site_id).map_or(now, |s| s.created_at);
        self.sites.insert(
            site.site_id,
            StoredSite {
                site,
                created_at,
                updated_at: now,
            },
        );
    }

    /// Every stored score record keyed by site.
    #[must_use]
    pub fn scores(&self) -> BTreeMap<SiteId, ScoreRecord> {
        self.scores.clone()
    }

    /// Make reads of `site_id` report `field` as malformed.
    pub fn corrupt_field(&mut self, site_id: SiteId, field: &str, reason: &str) {
        self.corrupted
            .insert(site_id, (field.to_owned(), reason.to_owned()));
    }

    /// Make score writes for `site_id` fail.
    pub fn fail_score_writes_for(&mut self, site_id: SiteId) {
        self.failing_score_writes.insert(site_id);
    }

    /// Make every parameter write fail.
    pub const fn fail_parameter_writes(&mut self) {
        self.fail_parameter_writes = true;
    }

    /// Set `flag` once `writes` score records have been written.
    pub fn trip_after_writes(&mut self, flag: Arc<AtomicBool>, writes: usize) {
        self.trip = Some((flag, writes));
    }
}

impl SiteStore for MemoryStore {
    fn upsert_site(&mut self, site: &Site) -> Result<(), StoreError> {
        self.insert(site.clone());
        Ok(())
    }

    fn site(&self, site_id: SiteId) -> Result<Site, StoreError> {
        if let Some((field, reason)) = self.corrupted.get(&site_id) {
            return Err(StoreError::MalformedField {
                site_id,
                field: field.clone(),
                reason: reason.clone(),
            });
        }
        self.sites
            .get(&site_id)
            .map(|stored| stored.site.clone())
            .ok_or(StoreError::NotFound { site_id })
    }

    fn site_ids(&self) -> Result<Vec<SiteId>, StoreError> {
        Ok(self.sites.keys().copied().collect())
    }
}

impl ScoreStore for MemoryStore {
    fn upsert_score(&mut self, record: &ScoreRecord) -> Result<(), StoreError> {
        if self.failing_score_writes.contains(&record.site_id) {
            return Err(StoreError::backend("upsert score", InjectedFailure));
        }
        self.scores.insert(record.site_id, record.clone());
        self.score_writes += 1;
        if let Some((flag, after)) = &self.trip
            && self.score_writes >= *after
        {
            flag.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn score(&self, site_id: SiteId) -> Result<Option<ScoreRecord>, StoreError> {
        Ok(self.scores.get(&site_id).cloned())
    }
}

impl WeightParameterStore for MemoryStore {
    fn write_parameters(&mut self, parameters: &[(&'static str, f64)]) -> Result<(), StoreError> {
        if self.fail_parameter_writes {
            return Err(StoreError::backend("write parameters", InjectedFailure));
        }
        for (name, value) in parameters {
            self.parameters.insert((*name).to_owned(), *value);
        }
        Ok(())
    }

    fn read_parameters(&self) -> Result<Vec<(String, f64)>, StoreError> {
        Ok(self
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect())
    }
}

impl SiteScoreSource for MemoryStore {
    fn site_score_rows(&self) -> Result<Vec<SiteScoreRow>, StoreError> {
        Ok(self
            .sites
            .values()
            .filter_map(|stored| {
                self.scores.get(&stored.site.site_id).map(|score| SiteScoreRow {
                    site: stored.site.clone(),
                    created_at: stored.created_at,
                    updated_at: stored.updated_at,
                    score: score.clone(),
                })
            })
            .collect())
    }
}

const REGIONS: [&str; 4] = ["Rajasthan", "Gujarat", "Karnataka", "Tamil Nadu"];

fn cycle(id: SiteId, period: i64) -> f64 {
    f64::from(u8::try_from(id.rem_euclid(period)).unwrap_or_default())
}

fn pick<'a>(values: &[&'a str], id: SiteId) -> &'a str {
    usize::try_from(id)
        .ok()
        .and_then(|i| values.get(i.checked_rem(values.len()).unwrap_or_default()))
        .copied()
        .unwrap_or("Wasteland")
}

/// A valid site whose measurements vary deterministically with `site_id`.
#[expect(clippy::float_arithmetic, reason = "fixture measurements")]
#[must_use]
pub fn sample_site(site_id: SiteId) -> Site {
    let k = cycle(site_id, 7);
    Site {
        site_id,
        site_name: format!("Site {site_id:02}"),
        latitude: 20.0 + 0.1 * k,
        longitude: 75.0 + 0.1 * k,
        area_sqm: 4_000 + 3_000 * site_id.rem_euclid(1_000),
        solar_irradiance_kwh: 3.0 + 0.5 * k,
        grid_distance_km: 0.5 + 1.5 * cycle(site_id, 5),
        slope_degrees: 2.0 * cycle(site_id, 11),
        road_distance_km: 0.3 * k,
        elevation_m: 100 + 10 * site_id.rem_euclid(500),
        land_type: pick(&KNOWN_LAND_TYPES, site_id).to_owned(),
        region: pick(&REGIONS, site_id).to_owned(),
    }
}

/// The draft that validates into [`sample_site`].
#[must_use]
pub fn sample_draft(site_id: SiteId) -> SiteDraft {
    let site = sample_site(site_id);
    SiteDraft {
        site_id: site.site_id,
        site_name: site.site_name,
        latitude: site.latitude,
        longitude: site.longitude,
        area_sqm: site.area_sqm,
        solar_irradiance_kwh: site.solar_irradiance_kwh,
        grid_distance_km: site.grid_distance_km,
        slope_degrees: site.slope_degrees,
        road_distance_km: site.road_distance_km,
        elevation_m: site.elevation_m,
        land_type: site.land_type,
        region: site.region,
    }
}

/// [`sample_site`] joined with its score under the default weights.
#[must_use]
pub fn sample_row(site_id: SiteId) -> SiteScoreRow {
    let site = sample_site(site_id);
    let weights = WeightVector::DEFAULT;
    let sub_scores = SubScores::from_measurements(&site.measurements()).rounded();
    let now = FixedClock::default().now();
    SiteScoreRow {
        score: ScoreRecord {
            site_id,
            sub_scores,
            total_score: round2(sub_scores.weighted_total(&weights)),
            weights_snapshot: weights,
            computed_at: now,
        },
        site,
        created_at: now,
        updated_at: now,
    }
}
