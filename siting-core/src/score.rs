//! Weighted aggregation of sub-scores into a suitability score.
//!
//! [`score_site`] normalises a site's five measurements, rounds each
//! sub-score to two decimals and combines them with the supplied weights.
//! The weights are copied into the resulting [`ScoreRecord`] so the total can
//! always be recomputed from what was stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::{
    normalize_area, normalize_grid, normalize_infra, normalize_slope, normalize_solar,
};
use crate::site::{Measurements, Site, SiteId};
use crate::weights::{WeightError, WeightVector};

/// Source of the timestamp stamped on score records.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Round half away from zero to two decimal places.
///
/// # Examples
///
/// ```
/// use siting_core::round2;
///
/// assert_eq!(round2(33.333), 33.33);
/// assert_eq!(round2(-0.125), -0.13);
/// ```
#[expect(clippy::float_arithmetic, reason = "decimal rounding")]
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The five per-factor scores of a site, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    /// Normalised solar irradiance.
    pub solar_irradiance_score: f64,
    /// Normalised land area.
    pub area_score: f64,
    /// Normalised grid proximity.
    pub grid_distance_score: f64,
    /// Normalised terrain slope.
    pub slope_score: f64,
    /// Normalised road proximity.
    pub infrastructure_score: f64,
}

impl SubScores {
    /// Unrounded sub-scores for `measurements`.
    #[must_use]
    pub fn from_measurements(measurements: &Measurements) -> Self {
        Self {
            solar_irradiance_score: normalize_solar(measurements.solar_irradiance_kwh),
            area_score: normalize_area(measurements.area_sqm),
            grid_distance_score: normalize_grid(measurements.grid_distance_km),
            slope_score: normalize_slope(measurements.slope_degrees),
            infrastructure_score: normalize_infra(measurements.road_distance_km),
        }
    }

    /// Each sub-score rounded with [`round2`].
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            solar_irradiance_score: round2(self.solar_irradiance_score),
            area_score: round2(self.area_score),
            grid_distance_score: round2(self.grid_distance_score),
            slope_score: round2(self.slope_score),
            infrastructure_score: round2(self.infrastructure_score),
        }
    }

    /// Sub-scores paired with the weight that applies to each.
    #[must_use]
    pub const fn weighted_pairs(&self, weights: &WeightVector) -> [(f64, f64); 5] {
        [
            (self.solar_irradiance_score, weights.solar),
            (self.area_score, weights.area),
            (self.grid_distance_score, weights.grid),
            (self.slope_score, weights.slope),
            (self.infrastructure_score, weights.infra),
        ]
    }

    /// Unrounded dot product with `weights`, summed in factor order.
    #[expect(clippy::float_arithmetic, reason = "weighted sum")]
    #[must_use]
    pub fn weighted_total(&self, weights: &WeightVector) -> f64 {
        self.weighted_pairs(weights)
            .into_iter()
            .fold(0.0, |acc, (score, weight)| acc + score * weight)
    }
}

/// The latest score of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Scored site.
    pub site_id: SiteId,
    /// Rounded per-factor scores.
    #[serde(flatten)]
    pub sub_scores: SubScores,
    /// Rounded weighted sum of [`ScoreRecord::sub_scores`].
    #[serde(rename = "total_suitability_score")]
    pub total_score: f64,
    /// Weights used to produce [`ScoreRecord::total_score`].
    #[serde(rename = "parameters_snapshot")]
    pub weights_snapshot: WeightVector,
    /// When the record was computed.
    #[serde(rename = "analysis_timestamp")]
    pub computed_at: DateTime<Utc>,
}

impl ScoreRecord {
    /// Total derived from the stored sub-scores and snapshot.
    #[must_use]
    pub fn recompute_total(&self) -> f64 {
        round2(self.sub_scores.weighted_total(&self.weights_snapshot))
    }
}

/// Failure to score a single site.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    /// A measurement was `NaN` or infinite.
    #[error("site {site_id}: {field} is not a finite number")]
    NonNumeric {
        /// Affected site.
        site_id: SiteId,
        /// Offending measurement.
        field: &'static str,
    },
    /// A stored measurement could not be read as a number.
    #[error("site {site_id}: {field} could not be read: {reason}")]
    Unreadable {
        /// Affected site.
        site_id: SiteId,
        /// Offending column.
        field: String,
        /// Description of the stored value.
        reason: String,
    },
    /// The weights handed to the scorer were invalid.
    #[error("cannot score with invalid weights: {0}")]
    InvalidWeights(#[from] WeightError),
}

/// Score `site` with `weights`, stamping the record with `clock`.
///
/// Sub-scores are rounded first; the total is the rounded dot product of the
/// rounded sub-scores and `weights`.
///
/// # Examples
///
/// ```
/// use siting_core::{score_site, SiteDraft, SystemClock, WeightVector};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let site = SiteDraft {
///     site_id: 1,
///     site_name: "Pavagada".into(),
///     latitude: 14.1,
///     longitude: 77.3,
///     area_sqm: 60_000,
///     solar_irradiance_kwh: 7.0,
///     grid_distance_km: 0.5,
///     slope_degrees: 2.0,
///     road_distance_km: 0.2,
///     elevation_m: 640,
///     land_type: "Wasteland".into(),
///     region: "Karnataka".into(),
/// }
/// .validate()?;
/// let record = score_site(&site, &WeightVector::DEFAULT, &SystemClock)?;
/// assert_eq!(record.total_score, 100.0);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// [`ComputationError::NonNumeric`] for non-finite measurements and
/// [`ComputationError::InvalidWeights`] when `weights` fails validation.
pub fn score_site(
    site: &Site,
    weights: &WeightVector,
    clock: &dyn Clock,
) -> Result<ScoreRecord, ComputationError> {
    weights.validate()?;
    let measurements = site.measurements();
    if let Some((field, _)) = measurements
        .named()
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    {
        return Err(ComputationError::NonNumeric {
            site_id: site.site_id,
            field,
        });
    }
    let sub_scores = SubScores::from_measurements(&measurements).rounded();
    let total_score = round2(sub_scores.weighted_total(weights));
    Ok(ScoreRecord {
        site_id: site.site_id,
        sub_scores,
        total_score,
        weights_snapshot: *weights,
        computed_at: clock.now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedClock, sample_site};
    use rstest::{fixture, rstest};

    #[fixture]
    fn clock() -> FixedClock {
        FixedClock::default()
    }

    #[rstest]
    fn ideal_site_scores_one_hundred(clock: FixedClock) {
        let mut site = sample_site(1);
        site.solar_irradiance_kwh = 7.0;
        site.area_sqm = 60_000;
        site.grid_distance_km = 0.5;
        site.slope_degrees = 2.0;
        site.road_distance_km = 0.2;
        let record = score_site(&site, &WeightVector::DEFAULT, &clock).expect("scores");
        let all = SubScores {
            solar_irradiance_score: 100.0,
            area_score: 100.0,
            grid_distance_score: 100.0,
            slope_score: 100.0,
            infrastructure_score: 100.0,
        };
        assert_eq!(record.sub_scores, all);
        assert_eq!(record.total_score, 100.0);
        assert_eq!(record.computed_at, clock.now());
    }

    #[rstest]
    fn total_is_rounded_dot_product_of_snapshot(clock: FixedClock) {
        let mut site = sample_site(2);
        site.solar_irradiance_kwh = 4.1;
        site.area_sqm = 12_345;
        site.grid_distance_km = 7.3;
        site.slope_degrees = 16.2;
        site.road_distance_km = 1.9;
        let weights = WeightVector::new(0.40, 0.30, 0.15, 0.10, 0.05).expect("valid");
        let record = score_site(&site, &weights, &clock).expect("scores");
        assert_eq!(record.weights_snapshot, weights);
        assert_eq!(record.total_score, record.recompute_total());
        assert_eq!(record.sub_scores.solar_irradiance_score, 44.0);
        assert_eq!(record.sub_scores.area_score, 16.32);
        assert_eq!(record.sub_scores.grid_distance_score, 66.84);
        assert_eq!(record.sub_scores.slope_score, 38.0);
        assert_eq!(record.sub_scores.infrastructure_score, 68.89);
    }

    #[rstest]
    fn non_finite_measurement_is_reported(clock: FixedClock) {
        let mut site = sample_site(3);
        site.grid_distance_km = f64::INFINITY;
        let err = score_site(&site, &WeightVector::DEFAULT, &clock).expect_err("must fail");
        assert_eq!(
            err,
            ComputationError::NonNumeric {
                site_id: 3,
                field: "grid_distance_km"
            }
        );
    }

    #[rstest]
    fn invalid_weights_are_rejected(clock: FixedClock) {
        let weights = WeightVector {
            infra: 0.06,
            ..WeightVector::DEFAULT
        };
        let err = score_site(&sample_site(4), &weights, &clock).expect_err("must fail");
        assert!(matches!(err, ComputationError::InvalidWeights(_)));
    }

    #[rstest]
    #[case(0.005, 0.01)]
    #[case(-0.005, -0.01)]
    #[case(12.344_9, 12.34)]
    #[case(99.999, 100.0)]
    fn round2_rounds_half_away_from_zero(#[case] input: f64, #[case] expected: f64) {
        assert_eq!(round2(input), expected);
    }

    #[rstest]
    fn record_serialises_with_column_names(clock: FixedClock) {
        let record =
            score_site(&sample_site(5), &WeightVector::DEFAULT, &clock).expect("scores");
        let json = serde_json::to_value(&record).expect("serialise");
        assert!(json.get("total_suitability_score").is_some());
        assert!(json.get("slope_score").is_some());
        assert_eq!(
            json.pointer("/parameters_snapshot/solar"),
            Some(&serde_json::json!(0.35))
        );
    }
}
