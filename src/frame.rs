//! Record framing: length-prefixed, CRC-protected binary frames.
//!
//! A record file is a plain concatenation of frames, one per record:
//!
//! ```text
//! u64, little-endian    payload length
//! u32, little-endian    masked CRC-32C of the length bytes
//! [u8; length]          payload
//! u32, little-endian    masked CRC-32C of the payload
//! ```
//!
//! The checksum is CRC-32C (Castagnoli), stored masked so that data which
//! itself embeds CRCs stays well protected. The length CRC is verified
//! before the length is trusted, so a corrupt header can never drive a
//! huge allocation.
//!
//! [`FrameWriter`] and [`FrameReader`] do their own buffering; hand them
//! the raw sink or source.

use crate::error::{Error, Result};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

/// Frame header size on the wire: u64 length plus u32 masked CRC.
const HEADER_LEN: usize = 12;
/// Trailing payload CRC size.
const FOOTER_LEN: usize = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

/// Mask a CRC for storage.
#[inline]
fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Invert [`mask`].
#[inline]
fn unmask(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

/// Masked CRC-32C of `data`, as stored on the wire.
#[inline]
fn masked_crc(data: &[u8]) -> u32 {
    mask(crc32c::crc32c(data))
}

/// Writes frames to an underlying sink.
///
/// Errors latch: after a failed [`write`](FrameWriter::write) or
/// [`flush`](FrameWriter::flush) the writer refuses further work and keeps
/// returning the original failure, which is also available through
/// [`error`](FrameWriter::error). A latched writer may have written a
/// partial frame, so the sink contents are only trustworthy when the
/// writer finishes clean.
pub struct FrameWriter<W: Write> {
    sink: BufWriter<W>,
    latched: Option<(ErrorKind, String)>,
}

impl<W: Write> FrameWriter<W> {
    /// Create a writer over `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink: BufWriter::new(sink),
            latched: None,
        }
    }

    /// Append one frame holding `payload`.
    ///
    /// # Errors
    /// Returns the underlying I/O error; the same error is reported by
    /// every later call on this writer.
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        if let Some(error) = self.latched() {
            return Err(error);
        }
        match self.write_frame(payload) {
            Ok(()) => Ok(()),
            Err(error) => Err(self.latch(error)),
        }
    }

    fn write_frame(&mut self, payload: &[u8]) -> std::io::Result<()> {
        let mut header = [0u8; HEADER_LEN];
        header[..8].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        let length_crc = masked_crc(&header[..8]);
        header[8..].copy_from_slice(&length_crc.to_le_bytes());
        self.sink.write_all(&header)?;
        self.sink.write_all(payload)?;
        self.sink.write_all(&masked_crc(payload).to_le_bytes())?;
        Ok(())
    }

    /// Flush buffered frames to the sink.
    ///
    /// # Errors
    /// Returns and latches the underlying I/O error.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(error) = self.latched() {
            return Err(error);
        }
        match self.sink.flush() {
            Ok(()) => Ok(()),
            Err(error) => Err(self.latch(error)),
        }
    }

    /// The error latched by an earlier `write` or `flush`, if any.
    pub fn error(&self) -> Option<Error> {
        self.latched()
    }

    /// Flush and hand back the sink, e.g. to finish a compressed stream.
    ///
    /// # Errors
    /// Returns the latched error, or any error raised by the final flush.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        self.sink
            .into_inner()
            .map_err(|error| Error::Io(error.into_error()))
    }

    // io::Error is not Clone, so the latch keeps the kind and message and
    // rebuilds an equivalent error on each read.
    fn latch(&mut self, error: std::io::Error) -> Error {
        self.latched = Some((error.kind(), error.to_string()));
        Error::Io(error)
    }

    fn latched(&self) -> Option<Error> {
        self.latched
            .as_ref()
            .map(|(kind, message)| Error::Io(std::io::Error::new(*kind, message.clone())))
    }
}

/// Reads frames from an underlying source.
pub struct FrameReader<R: Read> {
    source: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader over `source`.
    pub fn new(source: R) -> Self {
        Self {
            source: BufReader::new(source),
        }
    }

    /// Read the next payload, or `Ok(None)` at a clean end of stream.
    ///
    /// End of stream is only clean on a frame boundary; running out of
    /// bytes anywhere inside a frame is an error.
    ///
    /// # Errors
    /// [`Error::InvalidHeaderChecksum`] and [`Error::InvalidPayloadChecksum`]
    /// flag corruption, [`Error::TruncatedFrame`] flags end of input inside
    /// a frame. None of them are recoverable: the stream position is
    /// undefined after any error.
    pub fn next(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; HEADER_LEN];
        let got = read_full(&mut self.source, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(Error::TruncatedFrame {
                expected: HEADER_LEN,
                got,
            });
        }

        let mut stored = [0u8; 4];
        stored.copy_from_slice(&header[8..]);
        if crc32c::crc32c(&header[..8]) != unmask(u32::from_le_bytes(stored)) {
            return Err(Error::InvalidHeaderChecksum);
        }

        let mut length = [0u8; 8];
        length.copy_from_slice(&header[..8]);
        let length = u64::from_le_bytes(length);
        let length = usize::try_from(length).map_err(|_| {
            Error::Io(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("frame length {length} exceeds addressable memory"),
            ))
        })?;

        let mut payload = vec![0u8; length];
        let got = read_full(&mut self.source, &mut payload)?;
        if got < length {
            return Err(Error::TruncatedFrame {
                expected: length,
                got,
            });
        }

        let mut footer = [0u8; FOOTER_LEN];
        let got = read_full(&mut self.source, &mut footer)?;
        if got < FOOTER_LEN {
            return Err(Error::TruncatedFrame {
                expected: FOOTER_LEN,
                got,
            });
        }
        if crc32c::crc32c(&payload) != unmask(u32::from_le_bytes(footer)) {
            return Err(Error::InvalidPayloadChecksum);
        }

        Ok(Some(payload))
    }
}

/// Fill `buf` as far as the source allows; short only at end of input.
fn read_full(source: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(error.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_round_trips() {
        for crc in [0, 1, 0xdead_beef, u32::MAX] {
            assert_eq!(unmask(mask(crc)), crc);
        }
    }

    #[test]
    fn crc32c_check_value() {
        // The Castagnoli check value from RFC 3720.
        assert_eq!(crc32c::crc32c(b"123456789"), 0xe306_9283);
    }

    #[test]
    fn masked_crc_differs_from_raw() {
        let data = b"some payload";
        assert_ne!(masked_crc(data), crc32c::crc32c(data));
    }

    /// Sink that accepts `remaining` bytes, then fails every write.
    struct FailingSink {
        remaining: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Err(std::io::Error::other("sink full"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_latches_first_failure() {
        let mut writer = FrameWriter::new(FailingSink { remaining: 100 });
        assert!(writer.error().is_none());

        // Larger than the sink allows, so the failure surfaces on write.
        let payload = vec![0u8; 64 * 1024];
        assert!(writer.write(&payload).is_err());
        assert!(writer.error().is_some());

        // Latched: later calls fail without touching the sink.
        assert!(writer.write(b"more").is_err());
        assert!(writer.flush().is_err());
        assert!(writer.into_inner().is_err());
    }

    #[test]
    fn writer_hands_back_sink() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write(b"abc").unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 3 + FOOTER_LEN);
    }
}
