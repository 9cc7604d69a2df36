//! Command line for building, extracting, and summarizing record
//! datasets.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use recshard::{
    BuildConfig, ExtractConfig, SummaryConfig, build_shards, extract_images, summarize,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "recshard",
    version,
    about = "Sharded record files for labeled image datasets"
)]
struct Cli {
    /// Print progress messages (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a CSV listing of labeled images into shard files
    Build {
        /// CSV listing (image_path,image_id,label_id,label_text,label_raw,source)
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for shard files
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,
        /// Base name for shard files
        #[arg(long, default_value = "train")]
        name: String,
        /// Records per shard file
        #[arg(short = 'n', long, default_value_t = 1024)]
        per_shard: usize,
        /// Worker threads (0 = all cores)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
        /// Wrap each shard in a zlib stream
        #[arg(short = 'z', long)]
        compress: bool,
        /// Re-encode every image as an RGB JPEG
        #[arg(long)]
        jpeg: bool,
    },
    /// Unpack record files into images plus an info.csv listing
    Extract {
        /// Record file, directory of record files, or glob pattern
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for images and info.csv
        #[arg(short, long)]
        outdir: PathBuf,
        /// Worker threads (0 = all cores)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
        /// Inputs are zlib-wrapped
        #[arg(short = 'z', long)]
        compress: bool,
    },
    /// Print aggregate label statistics for record files
    Summary {
        /// Record file, directory of record files, or glob pattern
        #[arg(short, long)]
        input: PathBuf,
        /// Worker threads (0 = all cores)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
        /// Inputs are zlib-wrapped
        #[arg(short = 'z', long)]
        compress: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            input,
            outdir,
            name,
            per_shard,
            threads,
            compress,
            jpeg,
        } => {
            let report = build_shards(&BuildConfig {
                input,
                outdir,
                name,
                per_shard,
                threads,
                compress,
                jpeg,
            })?;
            info!(
                shards = report.shards,
                records = report.records,
                skipped_rows = report.skipped_rows,
                skipped_images = report.skipped_images,
                "build finished"
            );
        }
        Commands::Extract {
            input,
            outdir,
            threads,
            compress,
        } => {
            let report = extract_images(&ExtractConfig {
                input,
                outdir,
                threads,
                compress,
            })?;
            info!(
                files = report.files,
                images = report.images,
                "extract finished"
            );
        }
        Commands::Summary {
            input,
            threads,
            compress,
            json,
        } => {
            let stats = summarize(&SummaryConfig {
                input,
                threads,
                compress,
            })?;
            if json {
                println!("{}", stats.to_json()?);
            } else {
                print!("{stats}");
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the verbosity flag picks the level.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}
