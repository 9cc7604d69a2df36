//! The per-image payload framed into shard files.
//!
//! An [`ImageRecord`] carries the encoded image bytes plus labels and
//! probed properties (dimensions, format, colorspace). On the wire it is
//! a postcard-encoded serde struct; the framing layer treats it as
//! opaque bytes.

use crate::error::Result;
use crate::metadata::ImageRow;
use image::{ColorType, DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Color channels stored per record. Pixel data is treated as
/// three-channel throughout.
pub const CHANNELS: u8 = 3;

/// One labeled image, ready for framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Unique image id.
    pub id: i64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color channel count, currently always [`CHANNELS`].
    pub channels: u8,
    /// Normalized label class.
    pub label_id: i64,
    /// Raw (original) label class.
    pub label_raw: i64,
    /// Human-readable normalized label.
    pub label_text: String,
    /// Producing organization.
    pub source_id: i64,
    /// Base name of the original image file.
    pub filename: String,
    /// Lowercase encoded format name, e.g. `"jpeg"` or `"png"`.
    pub format: String,
    /// `"RGB"`, `"Gray"`, or `"Unknown"`.
    pub colorspace: String,
    /// The encoded image bytes.
    pub data: Vec<u8>,
}

impl ImageRecord {
    /// Build a record from encoded image bytes plus labels, probing the
    /// bytes for dimensions, format, and colorspace.
    ///
    /// # Errors
    /// Fails when the bytes are not a decodable image.
    pub fn new(
        data: Vec<u8>,
        id: i64,
        label_id: i64,
        label_raw: i64,
        label_text: String,
        filename: String,
        source_id: i64,
    ) -> Result<Self> {
        let format = image::guess_format(&data)?;
        let decoded = image::load_from_memory(&data)?;
        Ok(Self {
            id,
            width: decoded.width(),
            height: decoded.height(),
            channels: CHANNELS,
            label_id,
            label_raw,
            label_text,
            source_id,
            filename,
            format: format_name(format).to_string(),
            colorspace: colorspace_name(decoded.color()).to_string(),
            data,
        })
    }

    /// Read the image a metadata row points at and attach the row's
    /// labels.
    ///
    /// # Errors
    /// Fails when the file cannot be read or its bytes cannot be decoded.
    pub fn from_row(row: &ImageRow) -> Result<Self> {
        let data = fs::read(&row.path)?;
        let filename = row
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(
            data,
            row.id,
            row.label_id,
            row.label_raw,
            row.label_text.clone(),
            filename,
            row.source_id,
        )
    }

    /// Encode for framing.
    ///
    /// # Errors
    /// Returns any serialization error.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decode a framed payload.
    ///
    /// # Errors
    /// Returns any deserialization error.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(postcard::from_bytes(payload)?)
    }

    /// Re-encode the image as an RGB JPEG, updating the stored bytes,
    /// format, and colorspace. Alpha is dropped; dimensions are kept.
    ///
    /// # Errors
    /// Fails when the stored bytes cannot be decoded or re-encoded.
    pub fn to_jpeg(&mut self) -> Result<()> {
        let decoded = image::load_from_memory(&self.data)?;
        let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
        let mut buf = Cursor::new(Vec::new());
        rgb.write_to(&mut buf, ImageFormat::Jpeg)?;
        self.data = buf.into_inner();
        self.format = "jpeg".to_string();
        self.colorspace = "RGB".to_string();
        Ok(())
    }

    /// Base name for extraction: `{id}.{format}`, falling back to the
    /// stored filename, then to `image.{format}` when the id is not
    /// positive.
    #[must_use]
    pub fn file_name(&self) -> String {
        if self.id > 0 {
            format!("{}.{}", self.id, self.format)
        } else if !self.filename.is_empty() {
            self.filename.clone()
        } else {
            format!("image.{}", self.format)
        }
    }

    /// The metadata row for this record, with its path under `base_dir`.
    #[must_use]
    pub fn to_row(&self, base_dir: &Path) -> ImageRow {
        ImageRow {
            path: base_dir.join(self.file_name()),
            id: self.id,
            label_id: self.label_id,
            label_text: self.label_text.clone(),
            label_raw: self.label_raw,
            source_id: self.source_id,
        }
    }

    /// Write the encoded image bytes to `path`.
    ///
    /// # Errors
    /// Returns any write error.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Short lowercase name for a probed format.
fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        _ => "unknown",
    }
}

/// Colorspace bucket for a decoded color type.
fn colorspace_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => "Gray",
        ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::Rgb16
        | ColorType::Rgba16
        | ColorType::Rgb32F
        | ColorType::Rgba32F => "RGB",
        _ => "Unknown",
    }
}
