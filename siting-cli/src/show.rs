//! `show` command: one site with its latest score.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use siting_core::SiteId;

use crate::{ARG_DATABASE, CliError, database_or_default, open_store, write_json};

pub(crate) const ARG_SITE_ID: &str = "site-id";
pub(crate) const ENV_SITE_ID: &str = "SITING_CMDS_SHOW_SITE_ID";

/// CLI arguments for the `show` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "show", about = "Show one site with its latest score")]
#[ortho_config(prefix = "SITING")]
pub(crate) struct ShowArgs {
    /// Key of the site to show.
    #[arg(value_name = "site-id")]
    #[serde(default)]
    pub(crate) site_id: Option<SiteId>,
    /// SQLite database path.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

/// Resolved `show` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShowConfig {
    pub(crate) site_id: SiteId,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<ShowArgs> for ShowConfig {
    type Error = CliError;

    fn try_from(args: ShowArgs) -> Result<Self, Self::Error> {
        let site_id = args.site_id.ok_or(CliError::MissingArgument {
            field: ARG_SITE_ID,
            env: ENV_SITE_ID,
        })?;
        Ok(Self {
            site_id,
            database: database_or_default(args.database),
        })
    }
}

pub(crate) fn run_show(args: ShowArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = ShowConfig::try_from(merged)?;
    let store = open_store(&config.database)?;
    let detail = store.site_detail(config.site_id)?;
    write_json(writer, &detail)
}
