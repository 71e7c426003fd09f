//! Error types emitted by the siting CLI.
//!
//! Keep this error type reasonably small, as every command returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use siting_core::{QueryError, RecalcError, SiteId, StoreError, WeightError};
use siting_data::{CsvError, IngestError, PersistError};
use thiserror::Error;

/// Errors emitted by the siting CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable that may supply it.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a regular file.
    #[error("{field} path {path:?} is not a file")]
    SourcePathNotFile {
        /// Flag name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening the database failed.
    #[error(transparent)]
    Database(#[from] PersistError),
    /// Reading the upload or writing the export failed.
    #[error(transparent)]
    Csv(#[from] CsvError),
    /// The upload was rejected or could not be stored.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// The requested weights are invalid.
    #[error("invalid weights: {0}")]
    Weights(#[from] WeightError),
    /// Recalculation could not run.
    #[error(transparent)]
    Recalc(#[from] RecalcError),
    /// Filter, ordering or pagination parameters were rejected.
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),
    /// The requested site does not exist.
    #[error("no such site: {site_id}")]
    NoSuchSite {
        /// Requested key.
        site_id: SiteId,
    },
    /// A store read failed.
    #[error(transparent)]
    Store(StoreError),
    /// Serialising command output failed.
    #[error("failed to serialise command output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write command output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<StoreError> for CliError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { site_id } => Self::NoSuchSite { site_id },
            other => Self::Store(other),
        }
    }
}
