//! Command-line interface for the solar siting engine.
//!
//! Every subcommand reads its options from flags, `SITING_`-prefixed
//! environment variables and configuration files, then prints JSON to
//! stdout (or writes a CSV file for `export`).
#![forbid(unsafe_code)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use serde::Serialize;
use siting_data::SqliteSiteStore;

mod analyze;
mod error;
mod ingest;
mod query;
mod show;

use analyze::{AnalyzeArgs, run_analyze};
pub use error::CliError;
use ingest::{IngestArgs, run_ingest};
use query::{ExportArgs, SitesArgs, StatisticsArgs, run_export, run_sites, run_statistics};
use show::{ShowArgs, run_show};

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const DEFAULT_DATABASE: &str = "siting.db";

/// Run the siting CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when argument parsing, configuration or the
/// selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()?;
    let mut stdout = std::io::stdout().lock();
    run_with(cli, &mut stdout)
}

fn run_with(cli: Cli, writer: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Command::Ingest(args) => run_ingest(args, writer),
        Command::Analyze(args) => run_analyze(args, writer),
        Command::Sites(args) => run_sites(args, writer),
        Command::Statistics(args) => run_statistics(args, writer),
        Command::Export(args) => run_export(args, writer),
        Command::Show(args) => run_show(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "siting",
    about = "Score, filter and export candidate solar sites",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a CSV of sites; every row is stored and scored or none is.
    Ingest(IngestArgs),
    /// Replace the scoring weights and rescore every site.
    Analyze(AnalyzeArgs),
    /// List scored sites matching filters.
    Sites(SitesArgs),
    /// Summarise scored sites matching filters.
    Statistics(StatisticsArgs),
    /// Write scored sites matching filters to CSV.
    Export(ExportArgs),
    /// Show one site with its latest score.
    Show(ShowArgs),
}

pub(crate) fn database_or_default(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

pub(crate) fn open_store(path: &Utf8Path) -> Result<SqliteSiteStore, CliError> {
    log::debug!("opening database {path}");
    Ok(SqliteSiteStore::open(path)?)
}

pub(crate) fn write_json<T>(writer: &mut dyn Write, value: &T) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
