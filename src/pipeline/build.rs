//! The sharding pipeline: a CSV listing in, shard files out.

use super::{JobControl, thread_count};
use crate::compression::FileSink;
use crate::error::{Error, Result};
use crate::frame::FrameWriter;
use crate::metadata::{self, ImageRow};
use crate::record::ImageRecord;
use crate::shard::{Shard, ShardAccumulator, total_shards};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::fs;
use std::path::PathBuf;
use std::thread;
use tracing::{info, warn};

/// Settings for one build run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// CSV listing of the images to pack.
    pub input: PathBuf,
    /// Directory shard files are written to.
    pub outdir: PathBuf,
    /// Base name for shard files.
    pub name: String,
    /// Records per shard file.
    pub per_shard: usize,
    /// Worker threads; 0 means all cores.
    pub threads: usize,
    /// Wrap each shard file in a zlib stream.
    pub compress: bool,
    /// Re-encode every image as an RGB JPEG.
    pub jpeg: bool,
}

/// What a build run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Shard files written.
    pub shards: usize,
    /// Records framed into shards.
    pub records: u64,
    /// Metadata rows dropped by the parse pass.
    pub skipped_rows: u64,
    /// Listed images dropped during conversion.
    pub skipped_images: u64,
}

#[derive(Default)]
struct WorkerTally {
    shards: usize,
    records: u64,
    skipped_images: u64,
}

/// Convert the listing at `config.input` into shard files under
/// `config.outdir`.
///
/// The listing is read twice. The first pass validates the header and
/// counts rows, which fixes the shard count (and so every file name)
/// before any row is parsed. The second pass parses rows into shards and
/// hands each full shard to a bounded queue drained by worker threads.
///
/// Malformed rows and unreadable or undecodable images are logged,
/// counted in the report, and skipped. The first I/O or framing failure
/// anywhere cancels the whole run and is returned.
///
/// # Errors
/// Header validation, an empty listing, a zero `per_shard`, and any I/O
/// or framing failure while writing shards.
pub fn build_shards(config: &BuildConfig) -> Result<BuildReport> {
    if config.per_shard == 0 {
        return Err(Error::InvalidConfig(
            "per_shard must be at least 1".to_string(),
        ));
    }
    fs::create_dir_all(&config.outdir)?;

    let total = metadata::count_rows(&config.input)?;
    let planned = total_shards(total, config.per_shard);
    let reader = metadata::open_listing(&config.input)?;
    let threads = thread_count(config.threads).min(planned);

    info!(
        input = %config.input.display(),
        rows = total,
        shards = planned,
        threads,
        "building shards"
    );

    let ctl = JobControl::new();
    let (shard_tx, shard_rx) = bounded::<Shard>(threads);

    let mut report = BuildReport::default();
    thread::scope(|scope| {
        let feeder = {
            let ctl = ctl.clone();
            let per_shard = config.per_shard;
            thread::Builder::new()
                .name("shard-feeder".to_string())
                .spawn_scoped(scope, move || {
                    feed_rows(reader, total, per_shard, &shard_tx, &ctl)
                })
                .expect("spawn shard feeder")
        };

        let workers: Vec<_> = (0..threads)
            .map(|index| {
                let ctl = ctl.clone();
                let shard_rx = shard_rx.clone();
                thread::Builder::new()
                    .name(format!("shard-worker-{index}"))
                    .spawn_scoped(scope, move || write_shards(config, &ctl, &shard_rx))
                    .expect("spawn shard worker")
            })
            .collect();
        drop(shard_rx);

        report.skipped_rows = feeder.join().expect("shard feeder panicked");
        for worker in workers {
            let tally = worker.join().expect("shard worker panicked");
            report.shards += tally.shards;
            report.records += tally.records;
            report.skipped_images += tally.skipped_images;
        }
    });
    ctl.finish()?;

    Ok(report)
}

/// Parse pass: rows in file order, full shards onto the queue. Returns
/// the number of skipped rows.
fn feed_rows(
    mut reader: csv::Reader<fs::File>,
    total: usize,
    per_shard: usize,
    shards: &Sender<Shard>,
    ctl: &JobControl,
) -> u64 {
    let mut acc = ShardAccumulator::new(total, per_shard);
    let mut skipped = 0u64;
    let mut record = csv::StringRecord::new();

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => {
                if error.is_io_error() {
                    ctl.fail(error.into());
                    return skipped;
                }
                warn!(%error, "skipping unreadable metadata row");
                skipped += 1;
                continue;
            }
        }

        match ImageRow::from_record(&record) {
            Ok(row) => {
                if let Some(shard) = acc.push(row)
                    && !ctl.send(shards, shard)
                {
                    return skipped;
                }
            }
            Err(error) => {
                let line = record.position().map_or(0, csv::Position::line);
                warn!(line, %error, "skipping malformed metadata row");
                skipped += 1;
            }
        }
    }

    if let Some(shard) = acc.finish() {
        ctl.send(shards, shard);
    }
    skipped
}

/// Worker loop: one shard file per queue item.
fn write_shards(config: &BuildConfig, ctl: &JobControl, shards: &Receiver<Shard>) -> WorkerTally {
    let mut tally = WorkerTally::default();
    while let Some(shard) = ctl.recv(shards) {
        match write_shard(config, ctl, &shard) {
            Ok((records, skipped)) => {
                tally.shards += 1;
                tally.records += records;
                tally.skipped_images += skipped;
            }
            Err(error) => {
                ctl.fail(error);
                break;
            }
        }
    }
    tally
}

/// Write one shard file. Returns records written and images skipped.
fn write_shard(config: &BuildConfig, ctl: &JobControl, shard: &Shard) -> Result<(u64, u64)> {
    let file_name = shard.file_name(&config.name);
    info!(
        file = %file_name,
        images = shard.rows.len(),
        zlib = config.compress,
        "processing shard"
    );

    let path = config.outdir.join(&file_name);
    let sink = FileSink::create(&path, config.compress)?;
    let mut writer = FrameWriter::new(sink);

    let mut records = 0u64;
    let mut skipped = 0u64;
    for row in &shard.rows {
        // Stop at a record boundary once another thread has failed; the
        // file in progress is still finished cleanly below.
        if ctl.is_cancelled() {
            break;
        }

        let mut record = match ImageRecord::from_row(row) {
            Ok(record) => record,
            Err(error) => {
                warn!(image = %row.path.display(), %error, "skipping image");
                skipped += 1;
                continue;
            }
        };
        if config.jpeg
            && let Err(error) = record.to_jpeg()
        {
            warn!(image = %row.path.display(), %error, "skipping image that failed JPEG re-encode");
            skipped += 1;
            continue;
        }

        writer.write(&record.to_payload()?)?;
        records += 1;
    }

    writer.into_inner()?.finish()?;
    Ok((records, skipped))
}
