//! Byte sources that a [`ShowFileReader`](super::ShowFileReader) can scan.
//!
//! [`SliceSource`] reads from a bounded in-memory buffer and can verify the
//! file checksum up front. [`StreamSource`] reads from any `Read`, hashing
//! everything it consumes so the checksum is verified once the stream ends.

use std::io::{ErrorKind, Read};

use crc::Digest;

use super::checksum::{self, CHECKSUM_LEN};
use crate::error::ShowError;

/// Sequential, single-consumer access to the bytes of a show file.
pub trait BlockSource {
    /// Reads up to `buf.len()` bytes. Returns fewer bytes only when the
    /// source is exhausted.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize, ShowError>;

    /// Discards the next `len` bytes.
    fn skip(&mut self, len: usize) -> Result<(), ShowError>;

    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    /// Number of bytes left, if the source knows it.
    fn remaining(&self) -> Option<u64> {
        None
    }

    /// Reads the checksum field of the header. The field itself counts as
    /// zeros for checksum purposes.
    fn read_checksum_field(&mut self) -> Result<u32, ShowError> {
        let mut buf = [0u8; CHECKSUM_LEN];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Arms checksum verification against the value stored in the header.
    ///
    /// Sources that see the whole file verify immediately; streaming sources
    /// verify in [`finish`](BlockSource::finish).
    fn expect_checksum(&mut self, stored: u32) -> Result<(), ShowError>;

    /// Called once when the block sequence reached the end of the source.
    fn finish(&mut self) -> Result<(), ShowError> {
        Ok(())
    }

    /// Fills `buf` completely or fails with a format error.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ShowError> {
        let read = self.read_up_to(buf)?;
        if read < buf.len() {
            return Err(ShowError::bad_format(format!(
                "unexpected end of Skybrush file, needed {} more bytes",
                buf.len() - read
            )));
        }
        Ok(())
    }
}

/// Bounded in-memory buffer.
#[derive(Clone, Debug)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    offset: usize,
    checksum_field: Option<usize>,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            checksum_field: None,
        }
    }

    /// The bytes that have not been consumed yet.
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }
}

impl BlockSource for SliceSource<'_> {
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize, ShowError> {
        let rest = self.rest();
        let len = buf.len().min(rest.len());
        buf[..len].copy_from_slice(&rest[..len]);
        self.offset += len;
        Ok(len)
    }

    fn skip(&mut self, len: usize) -> Result<(), ShowError> {
        if len > self.rest().len() {
            return Err(ShowError::bad_format(format!(
                "block of {len} bytes extends past the end of the file"
            )));
        }
        self.offset += len;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.offset as u64
    }

    fn remaining(&self) -> Option<u64> {
        Some(self.rest().len() as u64)
    }

    fn read_checksum_field(&mut self) -> Result<u32, ShowError> {
        self.checksum_field = Some(self.offset);
        let mut buf = [0u8; CHECKSUM_LEN];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn expect_checksum(&mut self, stored: u32) -> Result<(), ShowError> {
        let field = self
            .checksum_field
            .ok_or_else(|| ShowError::bad_format("checksum field was not read yet"))?;
        let expected = checksum::file_checksum(self.data, field);
        if expected != stored {
            return Err(ShowError::ChecksumMismatch {
                expected,
                observed: stored,
            });
        }
        Ok(())
    }
}

/// Any `Read`, consumed strictly front to back.
///
/// Wrap unbuffered readers such as `File` in a `BufReader`.
pub struct StreamSource<R> {
    reader: R,
    position: u64,
    digest: Digest<'static, u32>,
    expected: Option<u32>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            digest: checksum::digest(),
            expected: None,
        }
    }

    /// Consume the source and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ShowError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }
}

impl<R: Read> BlockSource for StreamSource<R> {
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize, ShowError> {
        let read = self.fill(buf)?;
        self.digest.update(&buf[..read]);
        Ok(read)
    }

    fn skip(&mut self, mut len: usize) -> Result<(), ShowError> {
        // Skipped bytes still count towards the checksum.
        let mut scratch = [0u8; 512];
        while len > 0 {
            let chunk = len.min(scratch.len());
            self.read_exact(&mut scratch[..chunk])?;
            len -= chunk;
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_checksum_field(&mut self) -> Result<u32, ShowError> {
        let mut buf = [0u8; CHECKSUM_LEN];
        let read = self.fill(&mut buf)?;
        if read < CHECKSUM_LEN {
            return Err(ShowError::bad_format("truncated show file header"));
        }
        self.digest.update(&[0u8; CHECKSUM_LEN]);
        Ok(u32::from_le_bytes(buf))
    }

    fn expect_checksum(&mut self, stored: u32) -> Result<(), ShowError> {
        self.expected = Some(stored);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ShowError> {
        let Some(stored) = self.expected.take() else {
            return Ok(());
        };
        let expected = self.digest.clone().finalize();
        if expected != stored {
            return Err(ShowError::ChecksumMismatch {
                expected,
                observed: stored,
            });
        }
        Ok(())
    }
}
