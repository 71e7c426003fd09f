//! `ingest` command: upload a CSV batch of sites.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use siting_data::{ingest_sites, read_site_drafts};

use crate::{ARG_DATABASE, CliError, database_or_default, open_store, write_json};

pub(crate) const ARG_UPLOAD: &str = "csv";
pub(crate) const ENV_UPLOAD: &str = "SITING_CMDS_INGEST_CSV";

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "ingest",
    long_about = "Validate every row of a CSV upload, then upsert and score \
                 the sites in one transaction. A single invalid row rejects \
                 the whole upload.",
    about = "Upload a CSV of candidate sites"
)]
#[ortho_config(prefix = "SITING")]
pub(crate) struct IngestArgs {
    /// CSV file with one site per row and a header naming the fields.
    #[arg(value_name = "csv")]
    #[serde(default)]
    pub(crate) csv: Option<Utf8PathBuf>,
    /// SQLite database path.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl IngestArgs {
    fn into_config(self) -> Result<IngestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestConfig::try_from(merged)
    }
}

/// Resolved `ingest` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestConfig {
    pub(crate) csv: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
}

impl IngestConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.csv, ARG_UPLOAD)
    }
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match siting_data::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let csv = args.csv.ok_or(CliError::MissingArgument {
            field: ARG_UPLOAD,
            env: ENV_UPLOAD,
        })?;
        Ok(Self {
            csv,
            database: database_or_default(args.database),
        })
    }
}

pub(crate) fn run_ingest(args: IngestArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let drafts = read_site_drafts(&config.csv)?;
    let mut store = open_store(&config.database)?;
    let weights = store.active_weights()?;
    let summary = ingest_sites(&mut store, drafts, &weights)?;
    write_json(writer, &summary)
}
