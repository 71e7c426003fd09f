//! Candidate land sites and their write-time validation.
//!
//! Uploads arrive as [`SiteDraft`] values. [`SiteDraft::validate`] enforces
//! every physical range at once and either yields a [`Site`] or a
//! [`SiteValidationError`] naming each offending field, so a record is
//! rejected as a whole.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a candidate site.
pub type SiteId = i64;

/// Smallest plot, in square metres, that still counts as a site.
pub const MIN_AREA_SQM: i64 = 500;

/// Land types recognised by the upload tooling.
///
/// Other values are accepted and only reported through the log.
pub const KNOWN_LAND_TYPES: [&str; 9] = [
    "Agricultural",
    "Industrial",
    "Wasteland",
    "Hilly",
    "Open Land",
    "Mixed Use",
    "Forest Adjacent",
    "Near Water Body",
    "Peri-Urban",
];

/// An unvalidated site record, typically one row of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDraft {
    /// Upsert key.
    pub site_id: SiteId,
    /// Display name; surrounding whitespace is trimmed.
    pub site_name: String,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// Usable land area in square metres.
    pub area_sqm: i64,
    /// Average daily irradiance in kWh/m²/day.
    pub solar_irradiance_kwh: f64,
    /// Distance to the nearest grid connection in kilometres.
    pub grid_distance_km: f64,
    /// Terrain slope in degrees.
    pub slope_degrees: f64,
    /// Distance to the nearest road in kilometres.
    pub road_distance_km: f64,
    /// Elevation above sea level in metres.
    pub elevation_m: i64,
    /// Land classification, e.g. `Wasteland`.
    pub land_type: String,
    /// Administrative region or state.
    pub region: String,
}

/// A site whose fields satisfy every write-time invariant.
///
/// # Examples
///
/// ```
/// use siting_core::SiteDraft;
///
/// # fn main() -> Result<(), siting_core::SiteValidationError> {
/// let draft = SiteDraft {
///     site_id: 7,
///     site_name: "  Jaisalmer North ".into(),
///     latitude: 26.9,
///     longitude: 70.9,
///     area_sqm: 60_000,
///     solar_irradiance_kwh: 6.1,
///     grid_distance_km: 2.5,
///     slope_degrees: 1.5,
///     road_distance_km: 0.8,
///     elevation_m: 225,
///     land_type: "Wasteland".into(),
///     region: "Rajasthan".into(),
/// };
/// let site = draft.validate()?;
/// assert_eq!(site.site_name, "Jaisalmer North");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Upsert key.
    pub site_id: SiteId,
    /// Trimmed, non-empty display name.
    pub site_name: String,
    /// WGS84 latitude in `[-90, 90]`.
    pub latitude: f64,
    /// WGS84 longitude in `[-180, 180]`.
    pub longitude: f64,
    /// Land area, at least [`MIN_AREA_SQM`].
    pub area_sqm: i64,
    /// Irradiance in `[0, 10]` kWh/m²/day.
    pub solar_irradiance_kwh: f64,
    /// Grid distance in `[0, 500]` km.
    pub grid_distance_km: f64,
    /// Slope in `[0, 90]` degrees.
    pub slope_degrees: f64,
    /// Non-negative road distance in km.
    pub road_distance_km: f64,
    /// Elevation in `[-413, 8848]` metres.
    pub elevation_m: i64,
    /// Land classification.
    pub land_type: String,
    /// Administrative region or state.
    pub region: String,
}

/// The five raw measurements the normalizer consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    /// Irradiance in kWh/m²/day.
    pub solar_irradiance_kwh: f64,
    /// Area in square metres.
    pub area_sqm: f64,
    /// Grid distance in km.
    pub grid_distance_km: f64,
    /// Slope in degrees.
    pub slope_degrees: f64,
    /// Road distance in km.
    pub road_distance_km: f64,
}

impl Measurements {
    /// Pair each measurement with its column name.
    #[must_use]
    pub const fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("solar_irradiance_kwh", self.solar_irradiance_kwh),
            ("area_sqm", self.area_sqm),
            ("grid_distance_km", self.grid_distance_km),
            ("slope_degrees", self.slope_degrees),
            ("road_distance_km", self.road_distance_km),
        ]
    }
}

impl Site {
    /// Raw measurements used for scoring.
    #[expect(
        clippy::cast_precision_loss,
        reason = "site areas are far below the 2^53 limit of exact f64 integers"
    )]
    #[must_use]
    pub fn measurements(&self) -> Measurements {
        Measurements {
            solar_irradiance_kwh: self.solar_irradiance_kwh,
            area_sqm: self.area_sqm as f64,
            grid_distance_km: self.grid_distance_km,
            slope_degrees: self.slope_degrees,
            road_distance_km: self.road_distance_km,
        }
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldProblem {
    /// A text field was empty after trimming.
    #[error("{field} must not be blank")]
    Blank {
        /// Offending field.
        field: &'static str,
    },
    /// A numeric field fell outside its closed interval.
    #[error("{field} must be within {bounds} (got {value})")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Rendered input value.
        value: String,
        /// Rendered accepted interval.
        bounds: &'static str,
    },
    /// A numeric field fell below its lower bound.
    #[error("{field} must be at least {minimum} (got {value})")]
    BelowMinimum {
        /// Offending field.
        field: &'static str,
        /// Rendered input value.
        value: String,
        /// Rendered lower bound.
        minimum: &'static str,
    },
}

impl FieldProblem {
    /// Name of the offending field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Blank { field }
            | Self::OutOfRange { field, .. }
            | Self::BelowMinimum { field, .. } => field,
        }
    }
}

/// Every problem found in one draft; the record is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("site {site_id} is invalid: {}", join_problems(.problems))]
pub struct SiteValidationError {
    /// Key of the rejected record.
    pub site_id: SiteId,
    /// Problems in field order.
    pub problems: Vec<FieldProblem>,
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SiteDraft {
    /// Validate every field and produce a [`Site`].
    ///
    /// Text fields are trimmed before the blank check. Unknown land types are
    /// accepted.
    ///
    /// # Errors
    /// Returns [`SiteValidationError`] listing each field outside its range.
    pub fn validate(self) -> Result<Site, SiteValidationError> {
        let mut problems = Vec::new();

        let site_name = required_text(&mut problems, "site_name", &self.site_name);
        check_within(&mut problems, "latitude", self.latitude, -90.0, 90.0, "[-90, 90]");
        check_within(
            &mut problems,
            "longitude",
            self.longitude,
            -180.0,
            180.0,
            "[-180, 180]",
        );
        if self.area_sqm < MIN_AREA_SQM {
            problems.push(FieldProblem::BelowMinimum {
                field: "area_sqm",
                value: self.area_sqm.to_string(),
                minimum: "500",
            });
        }
        check_within(
            &mut problems,
            "solar_irradiance_kwh",
            self.solar_irradiance_kwh,
            0.0,
            10.0,
            "[0, 10]",
        );
        check_within(
            &mut problems,
            "grid_distance_km",
            self.grid_distance_km,
            0.0,
            500.0,
            "[0, 500]",
        );
        check_within(
            &mut problems,
            "slope_degrees",
            self.slope_degrees,
            0.0,
            90.0,
            "[0, 90]",
        );
        check_within(
            &mut problems,
            "road_distance_km",
            self.road_distance_km,
            0.0,
            f64::MAX,
            "[0, inf)",
        );
        if !(-413..=8848).contains(&self.elevation_m) {
            problems.push(FieldProblem::OutOfRange {
                field: "elevation_m",
                value: self.elevation_m.to_string(),
                bounds: "[-413, 8848]",
            });
        }
        let land_type = required_text(&mut problems, "land_type", &self.land_type);
        let region = required_text(&mut problems, "region", &self.region);

        if !problems.is_empty() {
            return Err(SiteValidationError {
                site_id: self.site_id,
                problems,
            });
        }

        if !KNOWN_LAND_TYPES.contains(&land_type.as_str()) {
            log::debug!(
                "site {}: land type {land_type:?} is not a recognised category",
                self.site_id
            );
        }

        Ok(Site {
            site_id: self.site_id,
            site_name,
            latitude: self.latitude,
            longitude: self.longitude,
            area_sqm: self.area_sqm,
            solar_irradiance_kwh: self.solar_irradiance_kwh,
            grid_distance_km: self.grid_distance_km,
            slope_degrees: self.slope_degrees,
            road_distance_km: self.road_distance_km,
            elevation_m: self.elevation_m,
            land_type,
            region,
        })
    }
}

impl TryFrom<SiteDraft> for Site {
    type Error = SiteValidationError;

    fn try_from(draft: SiteDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

fn required_text(problems: &mut Vec<FieldProblem>, field: &'static str, raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        problems.push(FieldProblem::Blank { field });
    }
    trimmed.to_owned()
}

// NaN fails `contains`, so non-finite input is reported as out of range.
fn check_within(
    problems: &mut Vec<FieldProblem>,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    bounds: &'static str,
) {
    if !(min..=max).contains(&value) {
        problems.push(FieldProblem::OutOfRange {
            field,
            value: value.to_string(),
            bounds,
        });
    }
}
