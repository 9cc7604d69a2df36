//! Fixtures for exercising dataset builds in tests.
//!
//! Everything here panics on failure instead of returning errors; a
//! fixture that cannot be written is a broken test environment, not a
//! condition to handle.

use crate::metadata::HEADER;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Encoded PNG bytes for a solid-color RGB image.
///
/// # Panics
/// On encoding failure.
#[must_use]
pub fn tiny_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode fixture png");
    buf.into_inner()
}

/// Encoded PNG bytes for a solid grayscale image.
///
/// # Panics
/// On encoding failure.
#[must_use]
pub fn tiny_gray_png(width: u32, height: u32, level: u8) -> Vec<u8> {
    let image = GrayImage::from_pixel(width, height, Luma([level]));
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode fixture png");
    buf.into_inner()
}

/// A complete scratch dataset: `count` solid PNG images plus a metadata
/// listing, alternating `cat` and `dog` labels. Returns the tempdir
/// holding everything (keep it alive for the test) and the listing path.
///
/// # Panics
/// On I/O failure while writing fixtures.
#[must_use]
pub fn scratch_dataset(count: usize) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create scratch dir");
    let listing = write_listing(dir.path(), count);
    (dir, listing)
}

/// Write `count` images under `dir/images/` plus a `labels.csv` listing;
/// returns the listing path.
///
/// Row `i` (zero-based) gets id `i + 1`, label `cat`/`dog` by parity with
/// label ids 0/1, raw labels 100/101, and sources cycling 10, 11, 12.
///
/// # Panics
/// On I/O failure while writing fixtures.
pub fn write_listing(dir: &Path, count: usize) -> PathBuf {
    let images = dir.join("images");
    fs::create_dir_all(&images).expect("create image dir");

    let cat = tiny_png(4, 3, [200, 40, 40]);
    let dog = tiny_png(4, 3, [40, 40, 200]);

    let mut csv = String::new();
    csv.push_str(&HEADER.join(","));
    csv.push('\n');
    for index in 0..count {
        let id = index + 1;
        let (label_id, label_text, bytes) = if index % 2 == 0 {
            (0, "cat", &cat)
        } else {
            (1, "dog", &dog)
        };
        let path = images.join(format!("{id}.png"));
        fs::write(&path, bytes).expect("write fixture image");
        csv.push_str(&format!(
            "{},{id},{label_id},{label_text},{},{}\n",
            path.display(),
            100 + label_id,
            10 + index % 3,
        ));
    }
    let listing = dir.join("labels.csv");
    fs::write(&listing, csv).expect("write listing");
    listing
}
