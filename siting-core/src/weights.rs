//! The active weight vector and its single-writer store.
//!
//! A [`WeightVector`] holds one weight per scoring factor. Valid vectors have
//! finite components in `[0, 1]` whose sum, taken left to right in field
//! order, is exactly `1.0`. [`WeightStore`] owns the active vector and
//! serialises replacements behind a mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, WeightParameterStore};

/// Relative importance of each scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    /// Solar irradiance weight.
    pub solar: f64,
    /// Land area weight.
    pub area: f64,
    /// Grid proximity weight.
    pub grid: f64,
    /// Terrain slope weight.
    pub slope: f64,
    /// Road and infrastructure proximity weight.
    pub infra: f64,
}

/// Named component of a [`WeightVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightComponent {
    /// See [`WeightVector::solar`].
    Solar,
    /// See [`WeightVector::area`].
    Area,
    /// See [`WeightVector::grid`].
    Grid,
    /// See [`WeightVector::slope`].
    Slope,
    /// See [`WeightVector::infra`].
    Infra,
}

impl WeightComponent {
    /// Components in summation order.
    pub const ALL: [Self; 5] = [Self::Solar, Self::Area, Self::Grid, Self::Slope, Self::Infra];

    /// Short key used in snapshots and CLI flags.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Area => "area",
            Self::Grid => "grid",
            Self::Slope => "slope",
            Self::Infra => "infra",
        }
    }

    /// Name of the persisted analysis parameter.
    #[must_use]
    pub const fn parameter_name(self) -> &'static str {
        match self {
            Self::Solar => "solar_irradiance_weight",
            Self::Area => "area_weight",
            Self::Grid => "grid_distance_weight",
            Self::Slope => "slope_weight",
            Self::Infra => "infrastructure_weight",
        }
    }

    /// Weight used when nothing has been configured.
    #[must_use]
    pub const fn default_weight(self) -> f64 {
        WeightVector::DEFAULT.get(self)
    }

    /// Look a component up by its short key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Look a component up by its parameter name.
    #[must_use]
    pub fn from_parameter_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.parameter_name() == name)
    }
}

/// Reasons a weight vector is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    /// A component was `NaN` or infinite.
    #[error("weight {component} must be a finite number")]
    NotFinite {
        /// Offending component key.
        component: &'static str,
    },
    /// A component fell outside `[0, 1]`.
    #[error("weight {component} must be within [0, 1] (got {value})")]
    OutOfRange {
        /// Offending component key.
        component: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The components did not sum to exactly one.
    #[error("weights must sum to 1.0 (got {sum})")]
    BadSum {
        /// Left-to-right sum of the components.
        sum: f64,
    },
    /// A named set lacked a component.
    #[error("weight {component} is missing")]
    Missing {
        /// Missing component key.
        component: &'static str,
    },
    /// A named set contained an unrecognised key.
    #[error("unknown weight {name:?}")]
    Unknown {
        /// Unrecognised key.
        name: String,
    },
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl WeightVector {
    /// Weights used until an explicit replacement.
    pub const DEFAULT: Self = Self {
        solar: 0.35,
        area: 0.25,
        grid: 0.20,
        slope: 0.15,
        infra: 0.05,
    };

    /// Build and validate a vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use siting_core::{WeightError, WeightVector};
    ///
    /// assert!(WeightVector::new(0.35, 0.25, 0.20, 0.15, 0.05).is_ok());
    /// assert!(matches!(
    ///     WeightVector::new(0.35, 0.25, 0.20, 0.15, 0.06),
    ///     Err(WeightError::BadSum { .. })
    /// ));
    /// ```
    ///
    /// # Errors
    /// See [`WeightVector::validate`].
    pub fn new(solar: f64, area: f64, grid: f64, slope: f64, infra: f64) -> Result<Self, WeightError> {
        let vector = Self {
            solar,
            area,
            grid,
            slope,
            infra,
        };
        vector.validate()?;
        Ok(vector)
    }

    /// Component value by name.
    #[must_use]
    pub const fn get(&self, component: WeightComponent) -> f64 {
        match component {
            WeightComponent::Solar => self.solar,
            WeightComponent::Area => self.area,
            WeightComponent::Grid => self.grid,
            WeightComponent::Slope => self.slope,
            WeightComponent::Infra => self.infra,
        }
    }

    const fn slot(&mut self, component: WeightComponent) -> &mut f64 {
        match component {
            WeightComponent::Solar => &mut self.solar,
            WeightComponent::Area => &mut self.area,
            WeightComponent::Grid => &mut self.grid,
            WeightComponent::Slope => &mut self.slope,
            WeightComponent::Infra => &mut self.infra,
        }
    }

    /// Left-to-right sum in [`WeightComponent::ALL`] order.
    #[expect(clippy::float_arithmetic, reason = "summing weights")]
    #[must_use]
    pub fn sum(&self) -> f64 {
        WeightComponent::ALL
            .into_iter()
            .fold(0.0, |acc, component| acc + self.get(component))
    }

    /// Check every component and the exact sum.
    ///
    /// # Errors
    /// [`WeightError::NotFinite`], [`WeightError::OutOfRange`] or
    /// [`WeightError::BadSum`], in that order of precedence.
    #[expect(clippy::float_cmp, reason = "the sum invariant is exact equality")]
    pub fn validate(&self) -> Result<(), WeightError> {
        for component in WeightComponent::ALL {
            let value = self.get(component);
            if !value.is_finite() {
                return Err(WeightError::NotFinite {
                    component: component.key(),
                });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(WeightError::OutOfRange {
                    component: component.key(),
                    value,
                });
            }
        }
        let sum = self.sum();
        if sum != 1.0 {
            return Err(WeightError::BadSum { sum });
        }
        Ok(())
    }

    /// Build a vector from `(key, value)` pairs, requiring all five keys.
    ///
    /// # Errors
    /// [`WeightError::Unknown`] for unrecognised keys,
    /// [`WeightError::Missing`] for absent ones, then the checks from
    /// [`WeightVector::validate`].
    pub fn try_from_named<'a, I>(pairs: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut vector = Self::DEFAULT;
        let mut seen = Vec::with_capacity(WeightComponent::ALL.len());
        for (name, value) in pairs {
            let component = WeightComponent::from_key(name).ok_or_else(|| WeightError::Unknown {
                name: name.to_owned(),
            })?;
            *vector.slot(component) = value;
            seen.push(component);
        }
        if let Some(missing) = WeightComponent::ALL
            .into_iter()
            .find(|component| !seen.contains(component))
        {
            return Err(WeightError::Missing {
                component: missing.key(),
            });
        }
        vector.validate()?;
        Ok(vector)
    }

    /// Persisted `(parameter name, value)` pairs.
    #[must_use]
    pub fn to_parameters(&self) -> [(&'static str, f64); 5] {
        WeightComponent::ALL.map(|c| (c.parameter_name(), self.get(c)))
    }

    /// Rebuild a vector from persisted parameters.
    ///
    /// Missing parameters take their default. Unknown names are ignored. A
    /// result that fails validation is still returned and logged, so callers
    /// see what is stored.
    #[must_use]
    pub fn from_parameters<'a, I>(parameters: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut vector = Self::DEFAULT;
        for (name, value) in parameters {
            if let Some(component) = WeightComponent::from_parameter_name(name) {
                *vector.slot(component) = value;
            }
        }
        if let Err(err) = vector.validate() {
            log::warn!("stored analysis parameters are inconsistent: {err}");
        }
        vector
    }
}

/// Owner of the active [`WeightVector`].
///
/// Reads and replacements are serialised through a mutex so concurrent
/// callers never observe a half-written vector.
#[derive(Debug, Default)]
pub struct WeightStore {
    active: Mutex<Option<WeightVector>>,
}

impl WeightStore {
    /// A store whose active vector is [`WeightVector::DEFAULT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// A store seeded with `weights`, typically read back from persistence.
    ///
    /// # Errors
    /// Returns [`WeightError`] when `weights` is invalid.
    pub fn with_weights(weights: WeightVector) -> Result<Self, WeightError> {
        weights.validate()?;
        Ok(Self {
            active: Mutex::new(Some(weights)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<WeightVector>> {
        // The guarded value is `Copy` and written in one assignment.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active vector, or the default when none was set.
    #[must_use]
    pub fn get_weights(&self) -> WeightVector {
        self.lock().unwrap_or_default()
    }

    /// Replace the active vector and return the previous one.
    ///
    /// # Errors
    /// Returns [`WeightError`] and leaves the store unchanged when `weights`
    /// is invalid.
    pub fn set_weights(&self, weights: WeightVector) -> Result<WeightVector, WeightError> {
        weights.validate()?;
        let mut guard = self.lock();
        let previous = guard.unwrap_or_default();
        *guard = Some(weights);
        drop(guard);
        log::info!("active weights replaced: {weights:?}");
        Ok(previous)
    }

    /// Validate, persist and activate `weights` under one lock.
    ///
    /// The in-memory vector changes only after every parameter was written.
    ///
    /// # Errors
    /// Returns [`WeightUpdateError`] when validation or persistence fails.
    pub fn set_and_persist<P>(
        &self,
        weights: WeightVector,
        parameters: &mut P,
    ) -> Result<WeightVector, WeightUpdateError>
    where
        P: WeightParameterStore + ?Sized,
    {
        weights.validate()?;
        let mut guard = self.lock();
        parameters.write_parameters(&weights.to_parameters())?;
        let previous = guard.unwrap_or_default();
        *guard = Some(weights);
        drop(guard);
        log::info!("active weights replaced and persisted: {weights:?}");
        Ok(previous)
    }
}

/// Failure to replace and persist the active weights.
#[derive(Debug, Error)]
pub enum WeightUpdateError {
    /// The candidate vector was rejected.
    #[error(transparent)]
    Invalid(#[from] WeightError),
    /// Writing the parameters failed.
    #[error("failed to persist weights: {0}")]
    Persist(#[from] StoreError),
}
