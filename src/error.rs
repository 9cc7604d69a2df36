//! Error types shared across the crate.
//!
//! The [`Error`] enum covers every fatal failure the library reports.
//! Framing variants (`InvalidHeaderChecksum`, `InvalidPayloadChecksum`,
//! `TruncatedFrame`) flag corruption and are never skipped past; the
//! stream position is undefined once one of them is returned.
//!
//! Row-level problems inside a pipeline (a malformed metadata row, an
//! unreadable or undecodable image) are not represented here. Those are
//! logged, counted, and skipped by the pipeline that hit them.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every fatal failure the library reports.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored CRC for a frame's length bytes does not match.
    #[error("invalid crc for frame length")]
    InvalidHeaderChecksum,

    /// The stored CRC for a frame's payload does not match.
    #[error("invalid crc for frame payload")]
    InvalidPayloadChecksum,

    /// End of input in the middle of a frame.
    #[error("truncated frame: expected {expected} bytes, got {got}")]
    TruncatedFrame { expected: usize, got: usize },

    /// CSV-level failure while reading a metadata listing.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The metadata header row does not start with `image_path`.
    #[error("invalid metadata header: first column is {0:?}, expected \"image_path\"")]
    InvalidMetadataHeader(String),

    /// The metadata listing holds no data rows.
    #[error("no metadata rows found in {}", .0.display())]
    EmptyInput(PathBuf),

    /// Record payload encode or decode failure.
    #[error("record payload error: {0}")]
    Payload(#[from] postcard::Error),

    /// Image decode or encode failure outside the per-row skip path.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid glob pattern in an input argument.
    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON encoding failure for statistics output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
