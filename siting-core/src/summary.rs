//! Dashboard-style statistics over a query outcome.

use serde::{Deserialize, Serialize};

use crate::query::{Aggregates, QueryOutcome, SiteScoreRow};
use crate::site::SiteId;

/// Headline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
    /// Sites matching the filters, before pagination.
    pub total_sites: usize,
}

/// One site in the scoring table, with presentation column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSystemEntry {
    /// Site key.
    pub site_id: SiteId,
    /// Display name.
    pub site_name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Irradiance in kWh/m²/day.
    pub solar_irradiance: f64,
    /// Area in square metres.
    pub available_land_area: i64,
    /// Grid distance in km.
    pub distance_from_grid: f64,
    /// Slope in degrees.
    pub slope_degrees: f64,
    /// Elevation in metres.
    pub terrain_elevation: i64,
    /// Land classification.
    pub land_type: String,
    /// Region or state.
    pub region: String,
    /// Road distance in km.
    pub proximity_to_infra: f64,
    /// Weighted total.
    pub total_suitability_score: f64,
}

impl From<&SiteScoreRow> for ScoringSystemEntry {
    fn from(row: &SiteScoreRow) -> Self {
        let site = &row.site;
        Self {
            site_id: site.site_id,
            site_name: site.site_name.clone(),
            latitude: site.latitude,
            longitude: site.longitude,
            solar_irradiance: site.solar_irradiance_kwh,
            available_land_area: site.area_sqm,
            distance_from_grid: site.grid_distance_km,
            slope_degrees: site.slope_degrees,
            terrain_elevation: site.elevation_m,
            land_type: site.land_type.clone(),
            region: site.region.clone(),
            proximity_to_infra: site.road_distance_km,
            total_suitability_score: row.score.total_score,
        }
    }
}

/// Per-site rows of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteData {
    /// Rows of the requested page in query order.
    pub site_scoring_system: Vec<ScoringSystemEntry>,
}

/// Counters, aggregates and the scoring table for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    /// Headline counters.
    pub kpi: Kpi,
    /// Aggregates over every matching row.
    pub stats: Aggregates,
    /// The requested page.
    pub site_data: SiteData,
}

impl From<&QueryOutcome> for StatisticsSummary {
    fn from(outcome: &QueryOutcome) -> Self {
        Self {
            kpi: Kpi {
                total_sites: outcome.total_count,
            },
            stats: outcome.aggregates,
            site_data: SiteData {
                site_scoring_system: outcome.rows.iter().map(ScoringSystemEntry::from).collect(),
            },
        }
    }
}
