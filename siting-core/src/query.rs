//! Filter, order, paginate and aggregate joined site/score rows.
//!
//! [`execute_query`] applies a [`SiteQuery`] in a fixed order: compiled
//! predicates, the site-name prefix, land type and region matches, ordering
//! and finally pagination. Counts and aggregates describe the filtered rows
//! before pagination.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{
    Column, ColumnSource, FilterError, FilterSpec, SITE_SCORE_SCHEMA, Scalar, Schema,
    compile_filters,
};
use crate::score::{ScoreRecord, round2};
use crate::site::{Site, SiteId};

/// A stored site joined with its latest score record.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteScoreRow {
    /// The site.
    pub site: Site,
    /// When the site was first stored.
    pub created_at: DateTime<Utc>,
    /// When the site was last upserted.
    pub updated_at: DateTime<Utc>,
    /// Latest score record of the site.
    pub score: ScoreRecord,
}

impl ColumnSource for SiteScoreRow {
    #[expect(
        clippy::cast_precision_loss,
        reason = "integer columns compare as f64"
    )]
    fn column_value(&self, column: Column) -> Option<Scalar> {
        let site = &self.site;
        let subs = &self.score.sub_scores;
        let value = match column {
            Column::SiteId => Scalar::Number(site.site_id as f64),
            Column::Latitude => Scalar::Number(site.latitude),
            Column::Longitude => Scalar::Number(site.longitude),
            Column::AreaSqm => Scalar::Number(site.area_sqm as f64),
            Column::SolarIrradianceKwh => Scalar::Number(site.solar_irradiance_kwh),
            Column::GridDistanceKm => Scalar::Number(site.grid_distance_km),
            Column::SlopeDegrees => Scalar::Number(site.slope_degrees),
            Column::RoadDistanceKm => Scalar::Number(site.road_distance_km),
            Column::ElevationM => Scalar::Number(site.elevation_m as f64),
            Column::CreatedAt => Scalar::Timestamp(self.created_at),
            Column::UpdatedAt => Scalar::Timestamp(self.updated_at),
            Column::SolarIrradianceScore => Scalar::Number(subs.solar_irradiance_score),
            Column::AreaScore => Scalar::Number(subs.area_score),
            Column::GridDistanceScore => Scalar::Number(subs.grid_distance_score),
            Column::SlopeScore => Scalar::Number(subs.slope_score),
            Column::InfrastructureScore => Scalar::Number(subs.infrastructure_score),
            Column::TotalSuitabilityScore => Scalar::Number(self.score.total_score),
            Column::AnalysisTimestamp => Scalar::Timestamp(self.score.computed_at),
        };
        Some(value)
    }
}

/// Flat, serialisable projection of a [`SiteScoreRow`].
///
/// Field order is the column order of JSON output and CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteScoreView {
    /// Site key.
    pub site_id: SiteId,
    /// Display name.
    pub site_name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Area in square metres.
    pub area_sqm: i64,
    /// Irradiance in kWh/m²/day.
    pub solar_irradiance_kwh: f64,
    /// Grid distance in km.
    pub grid_distance_km: f64,
    /// Slope in degrees.
    pub slope_degrees: f64,
    /// Road distance in km.
    pub road_distance_km: f64,
    /// Elevation in metres.
    pub elevation_m: i64,
    /// Land classification.
    pub land_type: String,
    /// Region or state.
    pub region: String,
    /// Irradiance sub-score.
    pub solar_irradiance_score: f64,
    /// Area sub-score.
    pub area_score: f64,
    /// Grid sub-score.
    pub grid_distance_score: f64,
    /// Slope sub-score.
    pub slope_score: f64,
    /// Road sub-score.
    pub infrastructure_score: f64,
    /// Weighted total.
    pub total_suitability_score: f64,
    /// When the score was computed.
    pub analysis_timestamp: DateTime<Utc>,
}

impl From<&SiteScoreRow> for SiteScoreView {
    fn from(row: &SiteScoreRow) -> Self {
        let site = &row.site;
        let subs = &row.score.sub_scores;
        Self {
            site_id: site.site_id,
            site_name: site.site_name.clone(),
            latitude: site.latitude,
            longitude: site.longitude,
            area_sqm: site.area_sqm,
            solar_irradiance_kwh: site.solar_irradiance_kwh,
            grid_distance_km: site.grid_distance_km,
            slope_degrees: site.slope_degrees,
            road_distance_km: site.road_distance_km,
            elevation_m: site.elevation_m,
            land_type: site.land_type.clone(),
            region: site.region.clone(),
            solar_irradiance_score: subs.solar_irradiance_score,
            area_score: subs.area_score,
            grid_distance_score: subs.grid_distance_score,
            slope_score: subs.slope_score,
            infrastructure_score: subs.infrastructure_score,
            total_suitability_score: row.score.total_score,
            analysis_timestamp: row.score.computed_at,
        }
    }
}

/// Offset and optional limit over the filtered rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    /// Rows to skip.
    pub offset: usize,
    /// Maximum rows to return; `None` means all.
    pub limit: Option<usize>,
}

impl Page {
    /// Parse raw `offset` and `limit` parameters.
    ///
    /// Each parameter falls back to its own default (`0` and unbounded) when
    /// absent, blank, negative or not an integer.
    ///
    /// # Examples
    ///
    /// ```
    /// use siting_core::Page;
    ///
    /// let page = Page::from_params(Some("5"), Some("abc"));
    /// assert_eq!(page.offset, 5);
    /// assert_eq!(page.limit, None);
    /// ```
    #[must_use]
    pub fn from_params(offset: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            offset: parse_count("offset", offset).unwrap_or(0),
            limit: parse_count("limit", limit),
        }
    }

    /// Keep the rows inside this page.
    #[must_use]
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let kept = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => kept.take(limit).collect(),
            None => kept.collect(),
        }
    }
}

fn parse_count(name: &str, raw: Option<&str>) -> Option<usize> {
    let text = raw.map(str::trim).filter(|t| !t.is_empty())?;
    match text.parse::<usize>() {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("ignoring {name}={text:?}: {err}");
            None
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Column and direction used to order results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// Sort key.
    pub column: Column,
    /// Direction.
    pub direction: Direction,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            column: Column::TotalSuitabilityScore,
            direction: Direction::Descending,
        }
    }
}

impl SortOrder {
    /// Parse `column` or `-column` (descending) against `schema`.
    ///
    /// # Errors
    /// [`QueryError::UnknownOrderColumn`] when the column is not in `schema`.
    pub fn parse(raw: &str, schema: &Schema) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        let (direction, name) = match trimmed.strip_prefix('-') {
            Some(rest) => (Direction::Descending, rest),
            None => (Direction::Ascending, trimmed),
        };
        let column = schema
            .lookup(name)
            .ok_or_else(|| QueryError::UnknownOrderColumn {
                column: name.to_owned(),
                allowed: schema.column_names(),
            })?;
        Ok(Self { column, direction })
    }

    fn compare(&self, a: &SiteScoreRow, b: &SiteScoreRow) -> Ordering {
        let ordering = match (a.column_value(self.column), b.column_value(self.column)) {
            (Some(Scalar::Number(x)), Some(Scalar::Number(y))) => x.total_cmp(&y),
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// Errors raised while building a [`SiteQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A filter token was invalid.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// The ordering column is not in the schema.
    #[error("cannot order by {column:?}; allowed columns: {allowed:?}")]
    UnknownOrderColumn {
        /// Requested column.
        column: String,
        /// Allowed column names.
        allowed: Vec<&'static str>,
    },
}

/// Raw query parameters as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Filter tokens, e.g. `col:area_sqm,min_score:10000`.
    pub tokens: Vec<String>,
    /// Case-insensitive site name prefix.
    pub site_name: Option<String>,
    /// Case-insensitive land type.
    pub land_type: Option<String>,
    /// Case-insensitive region.
    pub region: Option<String>,
    /// Raw offset.
    pub offset: Option<String>,
    /// Raw limit.
    pub limit: Option<String>,
    /// `column` or `-column`.
    pub order_by: Option<String>,
}

/// A validated query over [`SiteScoreRow`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteQuery {
    /// Predicates combined with AND.
    pub filters: Vec<FilterSpec>,
    /// Name prefix, matched case-insensitively.
    pub site_name: Option<String>,
    /// Land type, matched case-insensitively.
    pub land_type: Option<String>,
    /// Region, matched case-insensitively.
    pub region: Option<String>,
    /// Result ordering.
    pub order: SortOrder,
    /// Pagination window.
    pub page: Page,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Unicode case-insensitive equality.
fn same_text(stored: &str, wanted: &str) -> bool {
    stored.to_lowercase() == wanted.to_lowercase()
}

impl SiteQuery {
    /// Validate raw parameters against `schema`.
    ///
    /// Blank text parameters count as absent.
    ///
    /// # Errors
    /// Returns [`QueryError`] for invalid filter tokens or ordering.
    pub fn from_params(params: &QueryParams, schema: &Schema) -> Result<Self, QueryError> {
        let filters = compile_filters(&params.tokens, schema)?;
        let order = match non_blank(params.order_by.as_ref()) {
            Some(raw) => SortOrder::parse(&raw, schema)?,
            None => SortOrder::default(),
        };
        Ok(Self {
            filters,
            site_name: non_blank(params.site_name.as_ref()),
            land_type: non_blank(params.land_type.as_ref()),
            region: non_blank(params.region.as_ref()),
            order,
            page: Page::from_params(params.offset.as_deref(), params.limit.as_deref()),
        })
    }

    /// [`SiteQuery::from_params`] against [`SITE_SCORE_SCHEMA`].
    ///
    /// # Errors
    /// See [`SiteQuery::from_params`].
    pub fn for_site_scores(params: &QueryParams) -> Result<Self, QueryError> {
        Self::from_params(params, &SITE_SCORE_SCHEMA)
    }

    fn keeps(&self, row: &SiteScoreRow) -> bool {
        if !self.filters.iter().all(|spec| spec.matches(row)) {
            return false;
        }
        if let Some(prefix) = &self.site_name
            && !row
                .site
                .site_name
                .to_lowercase()
                .starts_with(&prefix.to_lowercase())
        {
            return false;
        }
        if let Some(land_type) = &self.land_type
            && !same_text(&row.site.land_type, land_type)
        {
            return false;
        }
        if let Some(region) = &self.region
            && !same_text(&row.site.region, region)
        {
            return false;
        }
        true
    }
}

/// Averages of the five sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FactorAverages {
    /// Mean irradiance sub-score.
    pub solar_irradiance: f64,
    /// Mean area sub-score.
    pub land_area: f64,
    /// Mean grid sub-score.
    pub grid_proximity: f64,
    /// Mean slope sub-score.
    pub terrain_slope: f64,
    /// Mean road sub-score.
    pub infrastructure: f64,
}

/// Summary figures over a filtered row set, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregates {
    /// Mean total suitability score.
    pub avg_suitability_score: f64,
    /// Sum of site areas in square metres.
    pub total_land_area: i64,
    /// Per-factor means.
    pub factor_averages: FactorAverages,
}

impl Aggregates {
    /// Aggregate `rows`; an empty set yields zeros.
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "means over a row count"
    )]
    #[must_use]
    pub fn over(rows: &[SiteScoreRow]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let mut sums = [0.0_f64; 6];
        let mut total_land_area = 0_i64;
        for row in rows {
            let subs = &row.score.sub_scores;
            let values = [
                row.score.total_score,
                subs.solar_irradiance_score,
                subs.area_score,
                subs.grid_distance_score,
                subs.slope_score,
                subs.infrastructure_score,
            ];
            for (sum, value) in sums.iter_mut().zip(values) {
                *sum += value;
            }
            total_land_area = total_land_area.saturating_add(row.site.area_sqm);
        }
        let count = rows.len() as f64;
        let [total, solar, area, grid, slope, infra] = sums.map(|sum| round2(sum / count));
        Self {
            avg_suitability_score: total,
            total_land_area,
            factor_averages: FactorAverages {
                solar_irradiance: solar,
                land_area: area,
                grid_proximity: grid,
                terrain_slope: slope,
                infrastructure: infra,
            },
        }
    }
}

/// Result of [`execute_query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Rows in the requested page.
    pub rows: Vec<SiteScoreRow>,
    /// Number of rows that matched before pagination.
    pub total_count: usize,
    /// Aggregates over the rows that matched before pagination.
    pub aggregates: Aggregates,
}

impl QueryOutcome {
    /// The page as flat views.
    #[must_use]
    pub fn views(&self) -> Vec<SiteScoreView> {
        self.rows.iter().map(SiteScoreView::from).collect()
    }
}

/// Run `query` over `rows`.
///
/// Sorting is stable, so rows with equal keys keep their input order.
#[must_use]
pub fn execute_query(rows: Vec<SiteScoreRow>, query: &SiteQuery) -> QueryOutcome {
    let mut matched: Vec<SiteScoreRow> = rows.into_iter().filter(|row| query.keeps(row)).collect();
    matched.sort_by(|a, b| query.order.compare(a, b));
    let total_count = matched.len();
    let aggregates = Aggregates::over(&matched);
    QueryOutcome {
        rows: query.page.apply(matched),
        total_count,
        aggregates,
    }
}
