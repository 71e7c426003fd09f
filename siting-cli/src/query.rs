//! `sites`, `statistics` and `export` commands over the joined site view.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Args, Parser};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use siting_core::{
    QueryOutcome, QueryParams, SiteQuery, SiteScoreSource, SiteScoreView, StatisticsSummary,
    execute_query,
};
use siting_data::{EXPORT_FILE_NAME, write_export_file};

use crate::{ARG_DATABASE, CliError, database_or_default, open_store, write_json};

/// Filter, sort and page flags shared by the read commands.
#[derive(Debug, Clone, PartialEq, Eq, Args, Deserialize, Serialize, Default)]
pub(crate) struct QueryFlags {
    /// Filter token; repeatable.
    #[arg(short = 'q', long = "filter", value_name = "token")]
    #[serde(default)]
    pub(crate) filter: Vec<String>,
    /// Case-insensitive site name prefix.
    #[arg(long = "site-name", value_name = "prefix")]
    #[serde(default)]
    pub(crate) site_name: Option<String>,
    /// Land type, matched case-insensitively.
    #[arg(long = "land-type", value_name = "type")]
    #[serde(default)]
    pub(crate) land_type: Option<String>,
    /// Region, matched case-insensitively.
    #[arg(long, value_name = "region")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Rows to skip; invalid values fall back to 0.
    #[arg(long, value_name = "n")]
    #[serde(default)]
    pub(crate) offset: Option<String>,
    /// Rows to return; invalid values mean no limit.
    #[arg(long, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<String>,
    /// Sort column, prefixed with `-` for descending order.
    #[arg(long = "order-by", value_name = "column", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) order_by: Option<String>,
}

impl From<QueryFlags> for QueryParams {
    fn from(flags: QueryFlags) -> Self {
        Self {
            tokens: flags.filter,
            site_name: flags.site_name,
            land_type: flags.land_type,
            region: flags.region,
            offset: flags.offset,
            limit: flags.limit,
            order_by: flags.order_by,
        }
    }
}

/// CLI arguments for the `sites` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "sites",
    long_about = "List scored sites. Filter tokens take the form \
                 `col:<column>,score:<v>` or `col:<column>,min_score:<v>,max_score:<v>`; \
                 repeated tokens are combined with AND.",
    about = "List scored sites matching filters"
)]
#[ortho_config(prefix = "SITING")]
pub(crate) struct SitesArgs {
    /// SQLite database path.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    #[command(flatten)]
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub(crate) query: QueryFlags,
}

/// CLI arguments for the `statistics` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "statistics",
    long_about = "Summarise scored sites matching filters. Counts and averages \
                 cover every matching site; `--offset` and `--limit` page the \
                 scoring table only.",
    about = "Summarise scored sites matching filters"
)]
#[ortho_config(prefix = "SITING")]
pub(crate) struct StatisticsArgs {
    /// SQLite database path.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    #[command(flatten)]
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub(crate) query: QueryFlags,
}

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "export",
    long_about = "Write scored sites matching filters to CSV. The header \
                 lists the exported column names; an empty result writes \
                 an empty file.",
    about = "Export scored sites to CSV"
)]
#[ortho_config(prefix = "SITING")]
pub(crate) struct ExportArgs {
    /// SQLite database path.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Output CSV path.
    #[arg(long, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    #[command(flatten)]
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub(crate) query: QueryFlags,
}

/// Resolved database and query parameters shared by the read commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) params: QueryParams,
}

impl QueryConfig {
    fn resolve(database: Option<Utf8PathBuf>, flags: QueryFlags) -> Self {
        Self {
            database: database_or_default(database),
            params: QueryParams::from(flags),
        }
    }
}

impl From<SitesArgs> for QueryConfig {
    fn from(args: SitesArgs) -> Self {
        Self::resolve(args.database, args.query)
    }
}

impl From<StatisticsArgs> for QueryConfig {
    fn from(args: StatisticsArgs) -> Self {
        Self::resolve(args.database, args.query)
    }
}

/// Resolved `export` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    pub(crate) query: QueryConfig,
    pub(crate) output: Utf8PathBuf,
}

impl From<ExportArgs> for ExportConfig {
    fn from(args: ExportArgs) -> Self {
        Self {
            output: args
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(EXPORT_FILE_NAME)),
            query: QueryConfig::resolve(args.database, args.query),
        }
    }
}

/// JSON body printed by `sites`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SitesResponse {
    /// Rows matching the filters before pagination.
    pub(crate) total_count: usize,
    /// The requested page.
    pub(crate) rows: Vec<SiteScoreView>,
}

/// JSON body printed by `export`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ExportReport {
    /// File written.
    pub(crate) path: Utf8PathBuf,
    /// Rows written, excluding the header.
    pub(crate) rows: usize,
}

fn execute(config: &QueryConfig) -> Result<QueryOutcome, CliError> {
    let query = SiteQuery::for_site_scores(&config.params)?;
    let store = open_store(&config.database)?;
    let rows = store.site_score_rows()?;
    Ok(execute_query(rows, &query))
}

pub(crate) fn run_sites(args: SitesArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let outcome = execute(&QueryConfig::from(merged))?;
    let response = SitesResponse {
        total_count: outcome.total_count,
        rows: outcome.views(),
    };
    write_json(writer, &response)
}

pub(crate) fn run_statistics(
    args: StatisticsArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let outcome = execute(&QueryConfig::from(merged))?;
    write_json(writer, &StatisticsSummary::from(&outcome))
}

pub(crate) fn run_export(args: ExportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = ExportConfig::from(merged);
    let outcome = execute(&config.query)?;
    let views = outcome.views();
    write_export_file(&config.output, &views)?;
    let report = ExportReport {
        path: config.output,
        rows: views.len(),
    };
    write_json(writer, &report)
}
