//! The aggregation pipelines: record files in, statistics or images out.
//!
//! `summarize` and `extract_images` share one fan-in: a feeder hands
//! file paths to a worker pool, each worker consumes whole files, and a
//! single aggregator on the calling thread folds results in completion
//! order. Folding is order-insensitive in both cases, so no sequencing
//! is imposed beyond the fold itself.

use super::{JobControl, thread_count};
use crate::compression::FileSource;
use crate::error::Result;
use crate::frame::FrameReader;
use crate::metadata::{INFO_FILE, ImageRow, InfoWriter};
use crate::record::ImageRecord;
use crate::stats::DatasetStats;
use crossbeam_channel::bounded;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::info;

/// Settings for a statistics scan.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Record file, directory of record files, or glob pattern.
    pub input: PathBuf,
    /// Worker threads; 0 means all cores.
    pub threads: usize,
    /// Inputs are zlib-wrapped.
    pub compress: bool,
}

/// Settings for an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Record file, directory of record files, or glob pattern.
    pub input: PathBuf,
    /// Directory images and `info.csv` are written to.
    pub outdir: PathBuf,
    /// Worker threads; 0 means all cores.
    pub threads: usize,
    /// Inputs are zlib-wrapped.
    pub compress: bool,
}

/// What an extraction run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Record files read.
    pub files: usize,
    /// Images written.
    pub images: u64,
}

/// Aggregate statistics over every record in the input.
///
/// # Errors
/// Input resolution failures, and any I/O, framing, or payload error in
/// any file. Corruption anywhere fails the whole scan.
pub fn summarize(config: &SummaryConfig) -> Result<DatasetStats> {
    let inputs = resolve_inputs(&config.input)?;
    let mut totals = DatasetStats::default();
    fan_in(
        inputs,
        config.threads,
        |path| scan_file(path, config.compress),
        |partial| {
            totals.merge(partial);
            Ok(())
        },
    )?;
    Ok(totals)
}

/// Unpack every record in the input into image files plus an `info.csv`
/// listing under `config.outdir`.
///
/// # Errors
/// Input resolution failures, and any I/O, framing, payload, or listing
/// write error.
pub fn extract_images(config: &ExtractConfig) -> Result<ExtractReport> {
    fs::create_dir_all(&config.outdir)?;
    let inputs = resolve_inputs(&config.input)?;
    let mut info = InfoWriter::create(&config.outdir.join(INFO_FILE))?;
    let mut report = ExtractReport::default();
    fan_in(
        inputs,
        config.threads,
        |path| extract_file(path, &config.outdir, config.compress),
        |rows| {
            report.files += 1;
            report.images += rows.len() as u64;
            for row in &rows {
                info.write_row(row)?;
            }
            Ok(())
        },
    )?;
    info.finish()?;
    Ok(report)
}

/// One feeder, a worker pool, one aggregator on the calling thread.
fn fan_in<R, W, A>(inputs: Vec<PathBuf>, threads: usize, worker: W, mut absorb: A) -> Result<()>
where
    R: Send,
    W: Fn(&Path) -> Result<R> + Sync,
    A: FnMut(R) -> Result<()>,
{
    let threads = thread_count(threads).min(inputs.len().max(1));
    let ctl = JobControl::new();
    let (path_tx, path_rx) = bounded::<PathBuf>(threads);
    let (result_tx, result_rx) = bounded::<R>(threads);

    thread::scope(|scope| {
        {
            let ctl = ctl.clone();
            thread::Builder::new()
                .name("scan-feeder".to_string())
                .spawn_scoped(scope, move || {
                    for path in inputs {
                        if !ctl.send(&path_tx, path) {
                            break;
                        }
                    }
                })
                .expect("spawn scan feeder");
        }

        for index in 0..threads {
            let ctl = ctl.clone();
            let path_rx = path_rx.clone();
            let result_tx = result_tx.clone();
            let worker = &worker;
            thread::Builder::new()
                .name(format!("scan-worker-{index}"))
                .spawn_scoped(scope, move || {
                    while let Some(path) = ctl.recv(&path_rx) {
                        match worker(&path) {
                            Ok(result) => {
                                if !ctl.send(&result_tx, result) {
                                    return;
                                }
                            }
                            Err(error) => {
                                ctl.fail(error);
                                return;
                            }
                        }
                    }
                })
                .expect("spawn scan worker");
        }
        drop(path_rx);
        drop(result_tx);

        while let Some(result) = ctl.recv(&result_rx) {
            if let Err(error) = absorb(result) {
                ctl.fail(error);
                break;
            }
        }
    });

    ctl.finish()
}

/// Turn the input argument into the list of record files to read.
///
/// A file stands for itself, a directory contributes its immediate
/// files, and a path that does not exist is tried as a glob pattern.
/// The list is sorted so feeding order is stable.
fn resolve_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    match fs::metadata(input) {
        Ok(meta) if meta.is_dir() => {
            let mut files = Vec::new();
            for entry in fs::read_dir(input)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();
            Ok(files)
        }
        Ok(_) => Ok(vec![input.to_path_buf()]),
        Err(not_found) if not_found.kind() == std::io::ErrorKind::NotFound => {
            let Some(pattern) = input.to_str() else {
                return Err(not_found.into());
            };
            let mut files: Vec<PathBuf> = glob::glob(pattern)?
                .filter_map(std::result::Result::ok)
                .filter(|path| path.is_file())
                .collect();
            if files.is_empty() {
                return Err(not_found.into());
            }
            files.sort();
            Ok(files)
        }
        Err(error) => Err(error.into()),
    }
}

/// Count every record in one file into a stats partial.
fn scan_file(path: &Path, compress: bool) -> Result<DatasetStats> {
    info!(path = %path.display(), zlib = compress, "processing file");
    let mut reader = FrameReader::new(FileSource::open(path, compress)?);
    let mut stats = DatasetStats::default();
    while let Some(payload) = reader.next()? {
        stats.observe(&ImageRecord::from_payload(&payload)?);
    }
    Ok(stats)
}

/// Write every record in one file out as an image; returns their listing
/// rows.
fn extract_file(path: &Path, outdir: &Path, compress: bool) -> Result<Vec<ImageRow>> {
    info!(path = %path.display(), zlib = compress, "processing file");
    let mut reader = FrameReader::new(FileSource::open(path, compress)?);
    let mut rows = Vec::new();
    while let Some(payload) = reader.next()? {
        let record = ImageRecord::from_payload(&payload)?;
        record.save(&outdir.join(record.file_name()))?;
        rows.push(record.to_row(outdir));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn resolves_a_file_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("train-00001-of-00001");
        fs::write(&file, b"").unwrap();
        assert_eq!(resolve_inputs(&file).unwrap(), vec![file]);
    }

    #[test]
    fn resolves_a_directory_to_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b"), b"").unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = resolve_inputs(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a"), dir.path().join("b")]);
    }

    #[test]
    fn resolves_a_glob_pattern() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train-00001-of-00002"), b"").unwrap();
        fs::write(dir.path().join("train-00002-of-00002"), b"").unwrap();
        fs::write(dir.path().join("other"), b"").unwrap();

        let files = resolve_inputs(&dir.path().join("train-*")).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("train-")));
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_inputs(&dir.path().join("absent"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn fan_in_folds_every_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut inputs = Vec::new();
        for index in 0..10 {
            let path = dir.path().join(format!("file-{index}"));
            fs::write(&path, b"").unwrap();
            inputs.push(path);
        }

        let mut seen = 0u32;
        fan_in(inputs, 4, |_path| Ok(1u32), |one| {
            seen += one;
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, 10);
    }

    #[test]
    fn fan_in_reports_worker_errors() {
        let inputs = vec![PathBuf::from("a"), PathBuf::from("b")];
        let result = fan_in(
            inputs,
            2,
            |_path| -> Result<()> { Err(Error::InvalidPayloadChecksum) },
            |()| Ok(()),
        );
        assert!(matches!(result, Err(Error::InvalidPayloadChecksum)));
    }

    #[test]
    fn fan_in_reports_aggregator_errors() {
        let inputs = vec![PathBuf::from("a")];
        let result = fan_in(
            inputs,
            1,
            |_path| Ok(()),
            |()| Err(Error::InvalidConfig("fold".to_string())),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn fan_in_handles_no_inputs() {
        let mut folds = 0;
        fan_in(Vec::new(), 4, |_path| Ok(()), |()| {
            folds += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(folds, 0);
    }
}
