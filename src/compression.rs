//! Optional whole-file zlib compression around record files.
//!
//! Compression is a per-file property chosen by the caller, never sniffed
//! from the bytes: the same flag used to write a file must be used to
//! read it back. The wrapper sits outside the framing, so a compressed
//! file is one zlib stream holding the concatenated frames.
//!
//! [`FileSink::finish`] exists because a zlib stream is only complete
//! once its trailer is written; dropping an encoder would swallow any
//! error from that final write.

use crate::error::Result;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// A created record file, optionally wrapped in a zlib encoder.
pub enum FileSink {
    Plain(File),
    Zlib(ZlibEncoder<File>),
}

impl FileSink {
    /// Create `path`, compressing everything written when `compress` is
    /// set.
    ///
    /// # Errors
    /// Returns any file creation error.
    pub fn create(path: &Path, compress: bool) -> Result<Self> {
        let file = File::create(path)?;
        Ok(if compress {
            Self::Zlib(ZlibEncoder::new(file, Compression::default()))
        } else {
            Self::Plain(file)
        })
    }

    /// Complete the stream. Required on success paths: the zlib trailer
    /// is only written here.
    ///
    /// # Errors
    /// Returns any error from the final compressed write.
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Plain(mut file) => file.flush()?,
            Self::Zlib(encoder) => {
                encoder.finish()?;
            }
        }
        Ok(())
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Zlib(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Zlib(encoder) => encoder.flush(),
        }
    }
}

/// An opened record file, optionally unwrapped through a zlib decoder.
pub enum FileSource {
    Plain(File),
    Zlib(ZlibDecoder<BufReader<File>>),
}

impl FileSource {
    /// Open `path`, decompressing everything read when `compress` is set.
    ///
    /// # Errors
    /// Returns any file open error.
    pub fn open(path: &Path, compress: bool) -> Result<Self> {
        let file = File::open(path)?;
        Ok(if compress {
            Self::Zlib(ZlibDecoder::new(BufReader::new(file)))
        } else {
            Self::Plain(file)
        })
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(file) => file.read(buf),
            Self::Zlib(decoder) => decoder.read(buf),
        }
    }
}
