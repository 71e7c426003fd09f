//! Map raw physical measurements onto comparable `0..=100` sub-scores.
//!
//! Each factor is a monotone piecewise-linear [`Curve`]. Inputs at or beyond
//! the outer knots saturate to the knot score; interior inputs interpolate
//! linearly. Nothing is rounded here; rounding belongs to aggregation.
//!
//! | factor | 0 at | 100 at | interior |
//! |---|---|---|---|
//! | solar irradiance (kWh/m²/day) | ≤ 3.0 | ≥ 5.5 | linear |
//! | area (m²) | ≤ 5 000 | ≥ 50 000 | linear |
//! | grid distance (km) | ≥ 20 | ≤ 1 | linear |
//! | slope (°) | ≥ 20 | ≤ 5 | 50 at 15° |
//! | road distance (km) | ≥ 5 | ≤ 0.5 | linear |

/// A piecewise-linear curve through `(raw, score)` knots sorted by `raw`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve {
    knots: &'static [(f64, f64)],
}

impl Curve {
    /// Build a curve from knots sorted by ascending raw value.
    #[must_use]
    pub const fn new(knots: &'static [(f64, f64)]) -> Self {
        Self { knots }
    }

    /// Evaluate the curve at `raw`, clamping outside the knot range.
    ///
    /// `NaN` propagates so callers can detect it.
    ///
    /// # Examples
    ///
    /// ```
    /// use siting_core::normalize::Curve;
    ///
    /// const RAMP: Curve = Curve::new(&[(0.0, 0.0), (10.0, 100.0)]);
    /// assert_eq!(RAMP.evaluate(-4.0), 0.0);
    /// assert_eq!(RAMP.evaluate(2.5), 25.0);
    /// assert_eq!(RAMP.evaluate(12.0), 100.0);
    /// ```
    #[expect(
        clippy::float_arithmetic,
        reason = "linear interpolation between knots"
    )]
    #[must_use]
    pub fn evaluate(&self, raw: f64) -> f64 {
        if raw.is_nan() {
            return f64::NAN;
        }
        let Some(&(first_raw, first_score)) = self.knots.first() else {
            return 0.0;
        };
        if raw <= first_raw {
            return first_score;
        }
        for segment in self.knots.windows(2) {
            let &[(x0, y0), (x1, y1)] = segment else {
                continue;
            };
            if raw <= x1 {
                return y0 + (raw - x0) / (x1 - x0) * (y1 - y0);
            }
        }
        self.knots.last().map_or(0.0, |&(_, score)| score)
    }
}

/// Higher irradiance is better.
pub const SOLAR_IRRADIANCE_CURVE: Curve = Curve::new(&[(3.0, 0.0), (5.5, 100.0)]);
/// Larger plots are better.
pub const AREA_CURVE: Curve = Curve::new(&[(5_000.0, 0.0), (50_000.0, 100.0)]);
/// Closer grid connections are better.
pub const GRID_DISTANCE_CURVE: Curve = Curve::new(&[(1.0, 100.0), (20.0, 0.0)]);
/// Flatter terrain is better; the penalty steepens past 15°.
pub const SLOPE_CURVE: Curve = Curve::new(&[(5.0, 100.0), (15.0, 50.0), (20.0, 0.0)]);
/// Closer roads are better.
pub const ROAD_DISTANCE_CURVE: Curve = Curve::new(&[(0.5, 100.0), (5.0, 0.0)]);

/// The five scoring factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    /// Solar irradiance.
    SolarIrradiance,
    /// Land area.
    Area,
    /// Grid proximity.
    GridDistance,
    /// Terrain slope.
    Slope,
    /// Road and infrastructure proximity.
    Infrastructure,
}

impl Factor {
    /// All factors in weight-vector order.
    pub const ALL: [Self; 5] = [
        Self::SolarIrradiance,
        Self::Area,
        Self::GridDistance,
        Self::Slope,
        Self::Infrastructure,
    ];

    /// Curve used to normalise this factor.
    #[must_use]
    pub const fn curve(self) -> Curve {
        match self {
            Self::SolarIrradiance => SOLAR_IRRADIANCE_CURVE,
            Self::Area => AREA_CURVE,
            Self::GridDistance => GRID_DISTANCE_CURVE,
            Self::Slope => SLOPE_CURVE,
            Self::Infrastructure => ROAD_DISTANCE_CURVE,
        }
    }

    /// Normalise a raw measurement for this factor.
    #[must_use]
    pub fn normalize(self, raw: f64) -> f64 {
        self.curve().evaluate(raw)
    }
}

/// Irradiance in kWh/m²/day to a `0..=100` sub-score.
#[must_use]
pub fn normalize_solar(raw: f64) -> f64 {
    SOLAR_IRRADIANCE_CURVE.evaluate(raw)
}

/// Area in square metres to a `0..=100` sub-score.
#[must_use]
pub fn normalize_area(raw: f64) -> f64 {
    AREA_CURVE.evaluate(raw)
}

/// Grid distance in km to a `0..=100` sub-score.
#[must_use]
pub fn normalize_grid(raw: f64) -> f64 {
    GRID_DISTANCE_CURVE.evaluate(raw)
}

/// Slope in degrees to a `0..=100` sub-score.
#[must_use]
pub fn normalize_slope(raw: f64) -> f64 {
    SLOPE_CURVE.evaluate(raw)
}

/// Road distance in km to a `0..=100` sub-score.
#[must_use]
pub fn normalize_infra(raw: f64) -> f64 {
    ROAD_DISTANCE_CURVE.evaluate(raw)
}
