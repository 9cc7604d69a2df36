//! Metadata listings: the CSV file that drives a build, and the
//! `info.csv` file that extraction writes back out.
//!
//! A listing is a header row followed by one row per image:
//!
//! ```text
//! image_path,image_id,label_id,label_text,label_raw,source
//! images/1.jpg,1,0,cat,100,10
//! ```
//!
//! Only the first header column is checked (it must be exactly
//! `image_path`); data rows are parsed by position, not by header name.
//! A listing is read in two passes, [`count_rows`] then [`open_listing`],
//! so the shard count is fixed before any row is parsed.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column names, in on-disk order.
pub const HEADER: [&str; 6] = [
    "image_path",
    "image_id",
    "label_id",
    "label_text",
    "label_raw",
    "source",
];

/// File name extraction writes its listing to.
pub const INFO_FILE: &str = "info.csv";

/// One parsed metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRow {
    /// Path to the encoded image file.
    #[serde(rename = "image_path")]
    pub path: PathBuf,
    /// Unique image id.
    #[serde(rename = "image_id")]
    pub id: i64,
    /// Normalized label class.
    pub label_id: i64,
    /// Human-readable normalized label.
    pub label_text: String,
    /// Raw (original) label class.
    pub label_raw: i64,
    /// Producing organization.
    #[serde(rename = "source")]
    pub source_id: i64,
}

/// Row-level parse failure. Pipelines log and skip these instead of
/// failing the run.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("expected 6 columns, got {got}")]
    Columns { got: usize },
    #[error("column {column} ({name}): invalid integer {value:?}")]
    Int {
        column: usize,
        name: &'static str,
        value: String,
    },
}

impl ImageRow {
    /// Parse a positional CSV record.
    ///
    /// # Errors
    /// Describes the offending column. Callers treat this as a skippable
    /// row-level problem, not a file-level one.
    pub fn from_record(record: &csv::StringRecord) -> std::result::Result<Self, RowError> {
        if record.len() != HEADER.len() {
            return Err(RowError::Columns { got: record.len() });
        }
        let int = |column: usize, name: &'static str| {
            record[column].parse::<i64>().map_err(|_| RowError::Int {
                column,
                name,
                value: record[column].to_string(),
            })
        };
        Ok(Self {
            path: PathBuf::from(&record[0]),
            id: int(1, "image_id")?,
            label_id: int(2, "label_id")?,
            label_text: record[3].to_string(),
            label_raw: int(4, "label_raw")?,
            source_id: int(5, "source")?,
        })
    }
}

/// Validate the header of `path` and count its data rows.
///
/// # Errors
/// [`Error::InvalidMetadataHeader`] when the first column is wrong,
/// [`Error::EmptyInput`] when no data rows follow the header, or any
/// open or read error.
pub fn count_rows(path: &Path) -> Result<usize> {
    let mut reader = open_listing(path)?;
    let mut record = csv::ByteRecord::new();
    let mut total = 0usize;
    while reader.read_byte_record(&mut record)? {
        total += 1;
    }
    if total == 0 {
        return Err(Error::EmptyInput(path.to_path_buf()));
    }
    Ok(total)
}

/// Open the listing at `path`, positioned past its validated header.
///
/// The reader is flexible: rows with the wrong column count come through
/// and fail per-row parsing instead of the whole read.
///
/// # Errors
/// [`Error::InvalidMetadataHeader`] when the first column is wrong, or
/// any open error.
pub fn open_listing(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    {
        let headers = reader.headers()?;
        if headers.get(0) != Some(HEADER[0]) {
            return Err(Error::InvalidMetadataHeader(
                headers.get(0).unwrap_or("").to_string(),
            ));
        }
    }
    Ok(reader)
}

/// Writer for the extraction listing, `info.csv`.
///
/// The header goes out at creation time, so even an extraction that
/// yields no records leaves a well-formed file.
pub struct InfoWriter {
    writer: csv::Writer<File>,
}

impl InfoWriter {
    /// Create `path` and write the header row.
    ///
    /// # Errors
    /// Returns any file creation or write error.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }

    /// Append one row.
    ///
    /// # Errors
    /// Returns any write error.
    pub fn write_row(&mut self, row: &ImageRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    /// Flush the listing to disk.
    ///
    /// # Errors
    /// Returns any flush error.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
