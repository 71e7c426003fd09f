//! `analyze` command: replace the scoring weights and rescore every site.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use siting_core::{
    RecalcSummary, SystemClock, WeightComponent, WeightStore, WeightVector, apply_weights,
};
use siting_data::SqliteSiteStore;

use crate::{ARG_DATABASE, CliError, database_or_default, open_store, write_json};

/// CLI arguments for the `analyze` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "analyze",
    long_about = "Replace the factor weights and rescore every stored site. \
                 All five weights are required and must sum to exactly 1.0.",
    about = "Update weights and recalculate all scores"
)]
#[ortho_config(prefix = "SITING")]
pub(crate) struct AnalyzeArgs {
    /// SQLite database path.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Solar irradiance weight.
    #[arg(long, value_name = "weight")]
    #[serde(default)]
    pub(crate) solar: Option<f64>,
    /// Land area weight.
    #[arg(long, value_name = "weight")]
    #[serde(default)]
    pub(crate) area: Option<f64>,
    /// Grid proximity weight.
    #[arg(long, value_name = "weight")]
    #[serde(default)]
    pub(crate) grid: Option<f64>,
    /// Slope weight.
    #[arg(long, value_name = "weight")]
    #[serde(default)]
    pub(crate) slope: Option<f64>,
    /// Road access weight.
    #[arg(long, value_name = "weight")]
    #[serde(default)]
    pub(crate) infra: Option<f64>,
}

/// Resolved `analyze` configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AnalyzeConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) weights: WeightVector,
}

impl TryFrom<AnalyzeArgs> for AnalyzeConfig {
    type Error = CliError;

    fn try_from(args: AnalyzeArgs) -> Result<Self, Self::Error> {
        let supplied = [
            (WeightComponent::Solar, args.solar),
            (WeightComponent::Area, args.area),
            (WeightComponent::Grid, args.grid),
            (WeightComponent::Slope, args.slope),
            (WeightComponent::Infra, args.infra),
        ];
        let weights = WeightVector::try_from_named(
            supplied
                .into_iter()
                .filter_map(|(component, value)| value.map(|v| (component.key(), v))),
        )?;
        Ok(Self {
            database: database_or_default(args.database),
            weights,
        })
    }
}

/// Weight store seeded from the persisted parameters, or the defaults when
/// those fail validation.
fn seeded_weight_store(store: &SqliteSiteStore) -> Result<WeightStore, CliError> {
    let current = store.active_weights()?;
    Ok(WeightStore::with_weights(current).unwrap_or_else(|err| {
        log::warn!("ignoring invalid stored weights: {err}");
        WeightStore::new()
    }))
}

pub(crate) fn run_analyze(args: AnalyzeArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = AnalyzeConfig::try_from(merged)?;
    let mut store = open_store(&config.database)?;
    let weight_store = seeded_weight_store(&store)?;
    let report = apply_weights(&weight_store, &mut store, config.weights, &SystemClock, None)?;
    write_json(writer, &RecalcSummary::from(&report))
}
