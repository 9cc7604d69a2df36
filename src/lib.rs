//! # recshard
//!
//! Sharded, checksummed record files for labeled image datasets.
//!
//! `recshard` packs a CSV listing of labeled images into fixed-size shard
//! files of CRC-protected binary frames, unpacks those files back into
//! images plus a listing, and aggregates label statistics over them.
//!
//! ## Key Features
//!
//! - **Self-checking format** - every frame carries masked CRC-32C
//!   checksums for its length and payload, so corruption is detected on
//!   read, never silently decoded
//! - **Deterministic sharding** - the shard count is fixed from the row
//!   count before any image is touched; file names like
//!   `train-00001-of-00003` never depend on thread timing
//! - **Parallel pipelines** - bounded queues feed a worker pool in both
//!   directions, with first-error cancellation across every thread
//! - **Lossy where it should be** - a malformed row or an undecodable
//!   image is logged, counted, and skipped; corruption and I/O failures
//!   stop the run
//! - **Optional zlib wrapping** - whole-file compression as a per-file
//!   flag, outside the framing
//!
//! ## The format
//!
//! A record file is a plain concatenation of frames:
//!
//! ```text
//! u64, little-endian    payload length
//! u32, little-endian    masked CRC-32C of the length bytes
//! [u8; length]          payload
//! u32, little-endian    masked CRC-32C of the payload
//! ```
//!
//! Each payload is a postcard-encoded [`ImageRecord`]: the encoded image
//! bytes plus labels and probed image properties.
//!
//! ## Quick Start
//!
//! ```no_run
//! use recshard::{BuildConfig, SummaryConfig, build_shards, summarize};
//!
//! # fn main() -> recshard::Result<()> {
//! let report = build_shards(&BuildConfig {
//!     input: "labels.csv".into(),
//!     outdir: "out".into(),
//!     name: "train".into(),
//!     per_shard: 1024,
//!     threads: 0,
//!     compress: false,
//!     jpeg: false,
//! })?;
//! println!("{} records in {} shards", report.records, report.shards);
//!
//! let stats = summarize(&SummaryConfig {
//!     input: "out".into(),
//!     threads: 0,
//!     compress: false,
//! })?;
//! print!("{stats}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`frame`] - the frame codec: [`FrameWriter`] and [`FrameReader`]
//! - [`record`] - the per-image payload and its probing
//! - [`metadata`] - CSV listings on both ends of the tool
//! - [`shard`] - shard math and the row accumulator
//! - [`pipeline`] - the parallel build and aggregation pipelines
//! - [`stats`] - label statistics and their rendering
//! - [`compression`] - optional whole-file zlib wrapping
//! - [`testing`] - fixtures for tests

pub mod compression;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod pipeline;
pub mod record;
pub mod shard;
pub mod stats;
pub mod testing;

pub use error::{Error, Result};
pub use frame::{FrameReader, FrameWriter};
pub use metadata::ImageRow;
pub use pipeline::{
    BuildConfig, BuildReport, ExtractConfig, ExtractReport, SummaryConfig, build_shards,
    extract_images, summarize,
};
pub use record::ImageRecord;
pub use shard::{Shard, ShardAccumulator, total_shards};
pub use stats::DatasetStats;
