//! CSV upload parsing and summary export.

use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use siting_core::{SiteDraft, SiteScoreView};
use thiserror::Error;

use crate::fs::{create_for_write, open_for_read};

/// Default file name for exported summaries.
pub const EXPORT_FILE_NAME: &str = "solar_sites_summary.csv";

/// Errors raised while reading or writing CSV files.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The input file could not be opened.
    #[error("failed to open CSV file {path:?}")]
    Open {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The output file could not be created.
    #[error("failed to create CSV file {path:?}")]
    Create {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A data row could not be decoded into a site draft.
    #[error("CSV row {row} is malformed")]
    Record {
        /// One-based data row, excluding the header.
        row: usize,
        /// Source error returned by `csv`.
        #[source]
        source: csv::Error,
    },
    /// Serialising a row failed.
    #[error("failed to write CSV row")]
    Write(#[source] csv::Error),
    /// Flushing the output failed.
    #[error("failed to flush CSV output")]
    Flush(#[source] std::io::Error),
}

/// Read site drafts from the CSV file at `path`.
///
/// # Errors
/// Returns [`CsvError`] when the file is missing or a row is malformed.
pub fn read_site_drafts(path: &Utf8Path) -> Result<Vec<SiteDraft>, CsvError> {
    let file = open_for_read(path).map_err(|source| CsvError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_site_drafts_from(file)
}

/// Read site drafts from any reader.
///
/// The first record is a header naming the draft fields; column order is
/// free and surrounding whitespace is trimmed.
///
/// # Errors
/// Returns [`CsvError::Record`] for the first row that fails to decode.
pub fn read_site_drafts_from<R: Read>(reader: R) -> Result<Vec<SiteDraft>, CsvError> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    csv_reader
        .deserialize::<SiteDraft>()
        .zip(1_usize..)
        .map(|(record, row)| record.map_err(|source| CsvError::Record { row, source }))
        .collect()
}

/// Write `rows` as CSV with a header of the serialized field names.
///
/// An empty slice produces an empty body.
///
/// # Errors
/// Returns [`CsvError`] when serialisation or flushing fails.
pub fn write_rows_csv<W: Write>(rows: &[SiteScoreView], writer: W) -> Result<(), CsvError> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    for row in rows {
        csv_writer.serialize(row).map_err(CsvError::Write)?;
    }
    csv_writer.flush().map_err(CsvError::Flush)
}

/// Create `path` (and missing parents) and write `rows` into it.
///
/// # Errors
/// Returns [`CsvError`] when the file cannot be created or written.
pub fn write_export_file(path: &Utf8Path, rows: &[SiteScoreView]) -> Result<(), CsvError> {
    let file = create_for_write(path).map_err(|source| CsvError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_rows_csv(rows, file)?;
    log::info!("exported {} rows to {path}", rows.len());
    Ok(())
}
