//! Compile user-supplied `key:value` filter tokens into predicates.
//!
//! A token looks like `col:area_sqm,min_score:10000`. Parts are split on
//! commas and then on the first colon; parts without a colon are ignored and
//! later duplicates overwrite earlier ones. Only the keys `col`, `score`,
//! `min_score` and `max_score` are accepted, and `col` must name a column the
//! target [`Schema`] allows.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Keys a filter token may contain.
pub const ALLOWED_KEYS: [&str; 4] = ["col", "score", "min_score", "max_score"];

/// Comparable value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integer or floating point.
    Numeric,
    /// UTC timestamp.
    Temporal,
}

/// Every column a filter or sort may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// `site_id`
    SiteId,
    /// `latitude`
    Latitude,
    /// `longitude`
    Longitude,
    /// `area_sqm`
    AreaSqm,
    /// `solar_irradiance_kwh`
    SolarIrradianceKwh,
    /// `grid_distance_km`
    GridDistanceKm,
    /// `slope_degrees`
    SlopeDegrees,
    /// `road_distance_km`
    RoadDistanceKm,
    /// `elevation_m`
    ElevationM,
    /// `created_at`
    CreatedAt,
    /// `updated_at`
    UpdatedAt,
    /// `solar_irradiance_score`
    SolarIrradianceScore,
    /// `area_score`
    AreaScore,
    /// `grid_distance_score`
    GridDistanceScore,
    /// `slope_score`
    SlopeScore,
    /// `infrastructure_score`
    InfrastructureScore,
    /// `total_suitability_score`
    TotalSuitabilityScore,
    /// `analysis_timestamp`
    AnalysisTimestamp,
}

impl Column {
    /// Column name as used in tokens and output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SiteId => "site_id",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::AreaSqm => "area_sqm",
            Self::SolarIrradianceKwh => "solar_irradiance_kwh",
            Self::GridDistanceKm => "grid_distance_km",
            Self::SlopeDegrees => "slope_degrees",
            Self::RoadDistanceKm => "road_distance_km",
            Self::ElevationM => "elevation_m",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::SolarIrradianceScore => "solar_irradiance_score",
            Self::AreaScore => "area_score",
            Self::GridDistanceScore => "grid_distance_score",
            Self::SlopeScore => "slope_score",
            Self::InfrastructureScore => "infrastructure_score",
            Self::TotalSuitabilityScore => "total_suitability_score",
            Self::AnalysisTimestamp => "analysis_timestamp",
        }
    }

    /// Value type stored in the column.
    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::CreatedAt | Self::UpdatedAt | Self::AnalysisTimestamp => ColumnKind::Temporal,
            _ => ColumnKind::Numeric,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named allow-list of filterable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    /// Model name used in error messages.
    pub name: &'static str,
    /// Allowed columns.
    pub columns: &'static [Column],
}

impl Schema {
    /// Resolve `name` against this schema.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Column> {
        self.columns.iter().copied().find(|c| c.name() == name)
    }

    /// Allowed column names, sorted.
    #[must_use]
    pub fn column_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.columns.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names
    }
}

/// Filterable columns of stored sites.
pub const SITE_SCHEMA: Schema = Schema {
    name: "sites",
    columns: &[
        Column::SiteId,
        Column::Latitude,
        Column::Longitude,
        Column::AreaSqm,
        Column::SolarIrradianceKwh,
        Column::GridDistanceKm,
        Column::SlopeDegrees,
        Column::RoadDistanceKm,
        Column::ElevationM,
        Column::CreatedAt,
        Column::UpdatedAt,
    ],
};

/// Filterable columns of the joined site and score view.
pub const SITE_SCORE_SCHEMA: Schema = Schema {
    name: "sites_with_scores",
    columns: &[
        Column::SiteId,
        Column::Latitude,
        Column::Longitude,
        Column::AreaSqm,
        Column::SolarIrradianceKwh,
        Column::GridDistanceKm,
        Column::SlopeDegrees,
        Column::RoadDistanceKm,
        Column::ElevationM,
        Column::SolarIrradianceScore,
        Column::AreaScore,
        Column::GridDistanceScore,
        Column::SlopeScore,
        Column::InfrastructureScore,
        Column::TotalSuitabilityScore,
        Column::AnalysisTimestamp,
    ],
};

/// A token value after opportunistic conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// No `.` and parsed as an integer.
    Int(i64),
    /// Contained `.` and parsed as a float.
    Float(f64),
    /// Anything else, kept verbatim.
    Text(String),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Convert a trimmed token value: with a `.` try a float, without one try an
/// integer, and otherwise keep the text.
///
/// # Examples
///
/// ```
/// use siting_core::filter::{TokenValue, convert_value};
///
/// assert_eq!(convert_value("42"), TokenValue::Int(42));
/// assert_eq!(convert_value("4.5"), TokenValue::Float(4.5));
/// assert_eq!(convert_value("2024-01-01"), TokenValue::Text("2024-01-01".into()));
/// ```
#[must_use]
pub fn convert_value(raw: &str) -> TokenValue {
    let parsed = if raw.contains('.') {
        raw.parse::<f64>().ok().map(TokenValue::Float)
    } else {
        raw.parse::<i64>().ok().map(TokenValue::Int)
    };
    parsed.unwrap_or_else(|| TokenValue::Text(raw.to_owned()))
}

/// A comparable value taken from a row or a filter bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Numeric value.
    Number(f64),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    /// Order two scalars of the same kind; mixed kinds are incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339()),
        }
    }
}

/// Comparison applied by a [`FilterSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `score`: column equals bound.
    Equals,
    /// `min_score`: column is at least bound.
    AtLeast,
    /// `max_score`: column is at most bound.
    AtMost,
}

/// Anything that can report the value of a [`Column`].
pub trait ColumnSource {
    /// Value of `column`, or `None` when the row does not carry it.
    fn column_value(&self, column: Column) -> Option<Scalar>;
}

/// One compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Filtered column.
    pub column: Column,
    /// Comparison.
    pub op: FilterOp,
    /// Right-hand side.
    pub bound: Scalar,
}

impl FilterSpec {
    /// Whether `row` satisfies this predicate.
    ///
    /// Rows lacking the column never match.
    #[must_use]
    pub fn matches(&self, row: &dyn ColumnSource) -> bool {
        let Some(value) = row.column_value(self.column) else {
            return false;
        };
        let Some(ordering) = value.compare(&self.bound) else {
            return false;
        };
        match self.op {
            FilterOp::Equals => ordering == Ordering::Equal,
            FilterOp::AtLeast => ordering != Ordering::Less,
            FilterOp::AtMost => ordering != Ordering::Greater,
        }
    }
}

/// Reasons a filter token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The token used keys outside [`ALLOWED_KEYS`].
    #[error("invalid query keys: {keys:?}; allowed keys: {ALLOWED_KEYS:?}")]
    UnknownKeys {
        /// Offending keys, sorted.
        keys: Vec<String>,
    },
    /// The token had no usable `col`.
    #[error("missing `col` in filter {token:?}")]
    MissingColumn {
        /// Offending token.
        token: String,
    },
    /// `col` is not filterable for the schema.
    #[error("invalid filter column {column:?} for {schema}; allowed columns: {allowed:?}")]
    ColumnNotAllowed {
        /// Requested column.
        column: String,
        /// Schema name.
        schema: &'static str,
        /// Allowed column names.
        allowed: Vec<&'static str>,
    },
    /// `score` was combined with `min_score` or `max_score`.
    #[error("column {column} cannot combine `score` with `min_score` or `max_score`")]
    ExactWithRange {
        /// Filtered column.
        column: Column,
    },
    /// A bound cannot be compared with the column's values.
    #[error("{key} value {value:?} cannot be compared with column {column}")]
    IncomparableBound {
        /// Filtered column.
        column: Column,
        /// Offending key.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Compile filter tokens against `schema`.
///
/// Blank tokens are skipped. Each remaining token yields one predicate per
/// bound it carries, in the order `score`, `min_score`, `max_score`.
///
/// # Examples
///
/// ```
/// use siting_core::filter::{Column, FilterOp, SITE_SCORE_SCHEMA, compile_filters};
///
/// # fn main() -> Result<(), siting_core::FilterError> {
/// let specs = compile_filters(&["col:area_sqm,min_score:10000"], &SITE_SCORE_SCHEMA)?;
/// assert_eq!(specs.len(), 1);
/// assert_eq!(specs[0].column, Column::AreaSqm);
/// assert_eq!(specs[0].op, FilterOp::AtLeast);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns the first [`FilterError`] encountered; nothing is compiled
/// partially.
pub fn compile_filters<T>(tokens: &[T], schema: &Schema) -> Result<Vec<FilterSpec>, FilterError>
where
    T: AsRef<str>,
{
    let mut specs = Vec::new();
    for token in tokens {
        let raw = token.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        compile_token(raw, schema, &mut specs)?;
    }
    Ok(specs)
}

fn split_token(raw: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for part in raw.split(',') {
        let Some((raw_key, raw_value)) = part.split_once(':') else {
            continue;
        };
        let key = raw_key.trim();
        let value = raw_value.trim().to_owned();
        if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value;
        } else {
            pairs.push((key.to_owned(), value));
        }
    }
    pairs
}

fn compile_token(
    raw: &str,
    schema: &Schema,
    specs: &mut Vec<FilterSpec>,
) -> Result<(), FilterError> {
    let pairs = split_token(raw);

    let mut unknown: Vec<String> = pairs
        .iter()
        .map(|(key, _)| key)
        .filter(|key| !ALLOWED_KEYS.contains(&key.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(FilterError::UnknownKeys { keys: unknown });
    }

    let value_of = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let column_name = value_of("col").unwrap_or_default();
    if column_name.is_empty() {
        return Err(FilterError::MissingColumn {
            token: raw.to_owned(),
        });
    }
    let column = schema
        .lookup(column_name)
        .ok_or_else(|| FilterError::ColumnNotAllowed {
            column: column_name.to_owned(),
            schema: schema.name,
            allowed: schema.column_names(),
        })?;

    let exact = value_of("score");
    if exact.is_some() && (value_of("min_score").is_some() || value_of("max_score").is_some()) {
        return Err(FilterError::ExactWithRange { column });
    }

    let bounds = [
        ("score", FilterOp::Equals),
        ("min_score", FilterOp::AtLeast),
        ("max_score", FilterOp::AtMost),
    ];
    let before = specs.len();
    for (key, op) in bounds {
        if let Some(value) = value_of(key) {
            let bound = parse_bound(column, key, value)?;
            specs.push(FilterSpec { column, op, bound });
        }
    }
    if specs.len() == before {
        log::debug!("filter on {column} carries no bound and matches every row");
    }
    Ok(())
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer bounds compare against f64 columns"
)]
fn parse_bound(column: Column, key: &'static str, raw: &str) -> Result<Scalar, FilterError> {
    let incomparable = || FilterError::IncomparableBound {
        column,
        key,
        value: raw.to_owned(),
    };
    match (column.kind(), convert_value(raw)) {
        (ColumnKind::Numeric, TokenValue::Int(v)) => Ok(Scalar::Number(v as f64)),
        (ColumnKind::Numeric, TokenValue::Float(v)) if v.is_finite() => Ok(Scalar::Number(v)),
        (ColumnKind::Temporal, TokenValue::Text(text)) => {
            parse_timestamp(&text).map(Scalar::Timestamp).ok_or_else(incomparable)
        }
        _ => Err(incomparable()),
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Row(Vec<(Column, Scalar)>);

    impl ColumnSource for Row {
        fn column_value(&self, column: Column) -> Option<Scalar> {
            self.0.iter().find(|(c, _)| *c == column).map(|(_, v)| *v)
        }
    }

    fn only(specs: &[FilterSpec]) -> &FilterSpec {
        assert_eq!(specs.len(), 1, "expected a single predicate");
        specs.first().expect("one spec")
    }

    #[rstest]
    fn min_score_compiles_to_at_least() {
        let specs =
            compile_filters(&["col:area_sqm,min_score:10000"], &SITE_SCORE_SCHEMA).expect("valid");
        let spec = only(&specs);
        assert_eq!(spec.column, Column::AreaSqm);
        assert_eq!(spec.op, FilterOp::AtLeast);
        assert_eq!(spec.bound, Scalar::Number(10_000.0));
    }

    #[rstest]
    fn range_yields_two_predicates_in_key_order() {
        let specs = compile_filters(
            &[" max_score : 80.5 , col : total_suitability_score , min_score:60"],
            &SITE_SCORE_SCHEMA,
        )
        .expect("valid");
        let ops: Vec<_> = specs.iter().map(|s| s.op).collect();
        assert_eq!(ops, [FilterOp::AtLeast, FilterOp::AtMost]);
    }

    #[rstest]
    #[case::missing_col("min_score:10")]
    #[case::empty_col("col:,min_score:10")]
    fn missing_column_is_rejected(#[case] token: &str) {
        let err = compile_filters(&[token], &SITE_SCORE_SCHEMA).expect_err("must fail");
        assert!(matches!(err, FilterError::MissingColumn { .. }));
    }

    #[rstest]
    fn exact_with_range_is_rejected() {
        let err = compile_filters(&["col:slope_degrees,score:5,min_score:1"], &SITE_SCHEMA)
            .expect_err("must fail");
        assert_eq!(
            err,
            FilterError::ExactWithRange {
                column: Column::SlopeDegrees
            }
        );
    }

    #[rstest]
    #[case::text_column("col:site_name,score:1")]
    #[case::score_on_sites("col:total_suitability_score,min_score:1")]
    #[case::injection("col:area_sqm; DROP TABLE sites,min_score:1")]
    fn non_whitelisted_column_is_rejected(#[case] token: &str) {
        let err = compile_filters(&[token], &SITE_SCHEMA).expect_err("must fail");
        assert!(matches!(err, FilterError::ColumnNotAllowed { .. }));
    }

    #[rstest]
    fn unknown_keys_are_listed_sorted() {
        let err = compile_filters(&["col:area_sqm,zeta:1,alpha:2"], &SITE_SCHEMA)
            .expect_err("must fail");
        assert_eq!(
            err,
            FilterError::UnknownKeys {
                keys: vec!["alpha".into(), "zeta".into()]
            }
        );
    }

    #[rstest]
    fn parts_without_colon_are_ignored_and_duplicates_overwrite() {
        let specs = compile_filters(
            &["col:elevation_m,stray,max_score:100,max_score:250"],
            &SITE_SCHEMA,
        )
        .expect("valid");
        assert_eq!(only(&specs).bound, Scalar::Number(250.0));
    }

    #[rstest]
    #[case::text_on_numeric("col:area_sqm,min_score:large")]
    #[case::number_on_temporal("col:created_at,min_score:5")]
    #[case::bad_timestamp("col:created_at,min_score:yesterday")]
    fn incomparable_bounds_are_rejected(#[case] token: &str) {
        let err = compile_filters(&[token], &SITE_SCHEMA).expect_err("must fail");
        assert!(matches!(err, FilterError::IncomparableBound { .. }));
    }

    #[rstest]
    fn temporal_bounds_accept_rfc3339_and_dates() {
        let specs = compile_filters(
            &["col:analysis_timestamp,min_score:2024-03-01,max_score:2024-03-31T23:59:59Z"],
            &SITE_SCORE_SCHEMA,
        )
        .expect("valid");
        assert_eq!(specs.len(), 2);
        assert!(
            specs
                .iter()
                .all(|s| matches!(s.bound, Scalar::Timestamp(_)))
        );
    }

    #[rstest]
    fn blank_tokens_are_skipped() {
        let specs = compile_filters(&["", "   "], &SITE_SCHEMA).expect("valid");
        assert!(specs.is_empty());
    }

    #[rstest]
    #[case(FilterOp::Equals, 50.0, true)]
    #[case(FilterOp::Equals, 50.5, false)]
    #[case(FilterOp::AtLeast, 50.0, true)]
    #[case(FilterOp::AtLeast, 50.01, false)]
    #[case(FilterOp::AtMost, 50.0, true)]
    #[case(FilterOp::AtMost, 49.99, false)]
    fn predicates_are_inclusive(#[case] op: FilterOp, #[case] bound: f64, #[case] expected: bool) {
        let row = Row(vec![(Column::SlopeScore, Scalar::Number(50.0))]);
        let spec = FilterSpec {
            column: Column::SlopeScore,
            op,
            bound: Scalar::Number(bound),
        };
        assert_eq!(spec.matches(&row), expected);
    }

    #[rstest]
    fn rows_without_the_column_do_not_match() {
        let spec = FilterSpec {
            column: Column::AreaScore,
            op: FilterOp::AtLeast,
            bound: Scalar::Number(0.0),
        };
        assert!(!spec.matches(&Row(Vec::new())));
    }
}
