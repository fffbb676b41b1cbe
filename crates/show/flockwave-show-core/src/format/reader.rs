//! Lazy, single-pass reader for show files.
//!
//! [`ShowFileReader`] validates the header on construction and then hands out
//! one [`Block`] at a time. Block bodies stay in the source until
//! [`Block::read`] is called; bodies that were never read are skipped using
//! their length field when the reader advances.

use std::io::Read;

use log::{debug, trace, warn};

use super::source::{BlockSource, SliceSource, StreamSource};
use super::{
    BlockType, FileFeatures, BLOCK_HEADER_LEN, MAGIC, MAX_FORMAT_VERSION, MIN_FORMAT_VERSION,
};
use crate::config::ShowConfig;
use crate::error::ShowError;
use crate::rth::{decoding::decode_rth_plan, RthPlan};
use crate::trajectory::{decoding, TrajectorySpecification};
use crate::yaw::{decoding::decode_yaw_setpoints, YawSetpointList};

/// Reads blocks from a show file.
///
/// The reader owns its source; dropping the reader releases it on every exit
/// path. Use [`into_inner`](Self::into_inner) to take the source back.
pub struct ShowFileReader<S> {
    source: S,
    version: u8,
    features: FileFeatures,
    pending: usize,
    blocks_read: u64,
    done: bool,
}

impl<'a> ShowFileReader<SliceSource<'a>> {
    /// Open an in-memory show file. The checksum, if any, is verified here.
    pub fn from_bytes(data: &'a [u8]) -> Result<Self, ShowError> {
        Self::from_bytes_with_config(data, &ShowConfig::default())
    }

    pub fn from_bytes_with_config(data: &'a [u8], config: &ShowConfig) -> Result<Self, ShowError> {
        Self::open(SliceSource::new(data), config)
    }
}

impl<R: Read> ShowFileReader<StreamSource<R>> {
    /// Open a streaming show file. The checksum, if any, is verified when the
    /// block sequence reaches the end of the stream.
    pub fn from_reader(reader: R) -> Result<Self, ShowError> {
        Self::from_reader_with_config(reader, &ShowConfig::default())
    }

    pub fn from_reader_with_config(reader: R, config: &ShowConfig) -> Result<Self, ShowError> {
        Self::open(StreamSource::new(reader), config)
    }
}

impl<S: BlockSource> ShowFileReader<S> {
    /// Open a show file, reading and validating its header.
    pub fn open(mut source: S, config: &ShowConfig) -> Result<Self, ShowError> {
        let mut magic = [0u8; 4];
        let read = source.read_up_to(&mut magic)?;
        if read < magic.len() || magic != MAGIC {
            return Err(ShowError::bad_format("expected Skybrush file"));
        }

        let mut version = [0u8; 1];
        source.read_exact(&mut version)?;
        let version = version[0];
        if !(MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&version) {
            return Err(ShowError::UnsupportedVersion { found: version });
        }

        let mut features = FileFeatures::empty();
        if version >= 2 {
            let mut flags = [0u8; 1];
            source.read_exact(&mut flags)?;
            features = FileFeatures::from_bits_retain(flags[0]);
            let unknown = features.bits() & !FileFeatures::all().bits();
            if unknown != 0 {
                warn!("show file declares unknown feature bits {unknown:#04x}, ignoring them");
            }

            if features.contains(FileFeatures::CRC32) {
                let stored = source.read_checksum_field()?;
                if config.validate_checksum {
                    source.expect_checksum(stored)?;
                } else {
                    debug!("skipping checksum validation of show file");
                }
            }
        }

        debug!("opened show file, version {version}, features {features:?}");

        Ok(Self {
            source,
            version,
            features,
            pending: 0,
            blocks_read: 0,
            done: false,
        })
    }

    /// Format version from the header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Feature flags from the header; empty for version 1 files.
    pub fn features(&self) -> FileFeatures {
        self.features
    }

    /// Number of block headers read so far.
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Read the header of the next block, or `None` at the end of the file.
    ///
    /// The returned [`Block`] borrows the reader, so the previous block is
    /// always released before the reader advances. Once an error is
    /// returned, every later call returns `Ok(None)`.
    pub fn next_block(&mut self) -> Result<Option<Block<'_, S>>, ShowError> {
        if self.done {
            return Ok(None);
        }
        match self.advance() {
            Ok(Some((kind, len, offset))) => Ok(Some(Block {
                reader: self,
                kind,
                len,
                offset,
            })),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<(BlockType, usize, u64)>, ShowError> {
        if self.pending > 0 {
            trace!("skipping {} unread payload bytes", self.pending);
            self.source.skip(self.pending)?;
            self.pending = 0;
        }

        let mut header = [0u8; BLOCK_HEADER_LEN];
        let read = self.source.read_up_to(&mut header)?;
        if read == 0 {
            self.source.finish()?;
            return Ok(None);
        }
        if read < BLOCK_HEADER_LEN {
            return Err(ShowError::bad_format("truncated block header in Skybrush file"));
        }

        let kind = BlockType::from(header[0]);
        let len = usize::from(u16::from_le_bytes([header[1], header[2]]));
        if let Some(remaining) = self.source.remaining() {
            if len as u64 > remaining {
                return Err(ShowError::bad_format(format!(
                    "block length {len} points past the end of the file ({remaining} bytes left)"
                )));
            }
        }

        let offset = self.source.position();
        self.pending = len;
        self.blocks_read += 1;

        if kind.is_known() {
            trace!("block {kind:?} of {len} bytes at offset {offset}");
        } else {
            debug!("block with unknown type {} of {len} bytes at offset {offset}", kind.tag());
        }
        Ok(Some((kind, len, offset)))
    }

    /// Convert into an iterator of owned blocks.
    pub fn blocks(self) -> Blocks<S> {
        Blocks { reader: self }
    }

    /// Read every remaining block into memory.
    pub fn read_all_blocks(self) -> Result<Vec<RawBlock>, ShowError> {
        self.blocks().collect()
    }

    /// Consume the reader and return its source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

/// Header of one block, borrowed from its reader.
pub struct Block<'r, S: BlockSource> {
    reader: &'r mut ShowFileReader<S>,
    kind: BlockType,
    len: usize,
    offset: u64,
}

impl<S: BlockSource> Block<'_, S> {
    pub fn kind(&self) -> BlockType {
        self.kind
    }

    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position of the payload in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Materialize the payload.
    pub fn read(self) -> Result<Vec<u8>, ShowError> {
        let mut payload = vec![0u8; self.len];
        match self.reader.source.read_exact(&mut payload) {
            Ok(()) => {
                self.reader.pending = 0;
                Ok(payload)
            }
            Err(e) => {
                self.reader.done = true;
                Err(e)
            }
        }
    }

    /// Discard the payload right away.
    pub fn skip(self) -> Result<(), ShowError> {
        let result = self.reader.source.skip(self.len);
        self.reader.pending = 0;
        if result.is_err() {
            self.reader.done = true;
        }
        result
    }

    /// Read the payload into an owned [`RawBlock`].
    pub fn into_raw(self) -> Result<RawBlock, ShowError> {
        let kind = self.kind;
        let payload = self.read()?;
        Ok(RawBlock { kind, payload })
    }
}

/// A block with its payload in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBlock {
    pub kind: BlockType,
    pub payload: Vec<u8>,
}

impl RawBlock {
    pub fn new(kind: BlockType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Text of a comment block.
    pub fn text(&self) -> Result<&str, ShowError> {
        self.expect_kind(BlockType::Comment)?;
        std::str::from_utf8(&self.payload)
            .map_err(|e| ShowError::bad_format(format!("comment is not valid UTF-8: {e}")))
    }

    /// Decoded contents of a trajectory block.
    pub fn trajectory(&self) -> Result<TrajectorySpecification, ShowError> {
        self.expect_kind(BlockType::Trajectory)?;
        decoding::decode_trajectory(&self.payload)
    }

    /// Decoded contents of an RTH plan block.
    pub fn rth_plan(&self) -> Result<RthPlan, ShowError> {
        self.expect_kind(BlockType::RthPlan)?;
        decode_rth_plan(&self.payload)
    }

    /// Decoded contents of a yaw control block.
    pub fn yaw_setpoints(&self) -> Result<YawSetpointList, ShowError> {
        self.expect_kind(BlockType::YawControl)?;
        decode_yaw_setpoints(&self.payload)
    }

    fn expect_kind(&self, expected: BlockType) -> Result<(), ShowError> {
        if self.kind != expected {
            return Err(ShowError::InvalidType {
                reason: format!("expected a {expected:?} block, got {:?}", self.kind),
            });
        }
        Ok(())
    }
}

/// Single-pass iterator over the remaining blocks of a reader.
pub struct Blocks<S: BlockSource> {
    reader: ShowFileReader<S>,
}

impl<S: BlockSource> Blocks<S> {
    /// Give back the underlying reader.
    pub fn into_reader(self) -> ShowFileReader<S> {
        self.reader
    }
}

impl<S: BlockSource> Iterator for Blocks<S> {
    type Item = Result<RawBlock, ShowError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_block() {
            Ok(Some(block)) => Some(block.into_raw()),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const TRAJECTORY_BLOCK: &[u8] = b"\x01$\x00\n\x00\x00\x00\x00\x00\x00\x00\x00\
        \x10\x10'\xe8\x03\x01\x10'\xe8\x03\x04\x10'\xe8\x03\x05\x10'\x00\x00\x00\x00\
        \x10\x10'\x00\x00";
    const COMMENT_BLOCK: &[u8] = b"\x03\x13\x00this is a test file";
    const YAW_BLOCK: &[u8] = b"\x05\x03\x00\x01\x08\x02";

    fn v1_file() -> Vec<u8> {
        [b"skyb\x01".as_slice(), TRAJECTORY_BLOCK, COMMENT_BLOCK].concat()
    }

    fn v2_file() -> Vec<u8> {
        [
            b"skyb\x02\x01\x93\x96\xe5\xdd".as_slice(),
            TRAJECTORY_BLOCK,
            COMMENT_BLOCK,
            YAW_BLOCK,
        ]
        .concat()
    }

    #[test]
    fn reads_version_1_file() {
        let data = v1_file();
        let mut reader = ShowFileReader::from_bytes(&data).unwrap();
        assert_eq!(reader.version(), 1);
        assert!(reader.features().is_empty());

        let block = reader.next_block().unwrap().unwrap();
        assert_eq!(block.kind(), BlockType::Trajectory);
        assert_eq!(block.len(), 36);
        assert_eq!(block.offset(), 8);
        assert_eq!(block.read().unwrap(), &TRAJECTORY_BLOCK[3..]);

        let block = reader.next_block().unwrap().unwrap();
        assert_eq!(block.kind(), BlockType::Comment);
        assert_eq!(block.read().unwrap(), b"this is a test file");

        assert!(reader.next_block().unwrap().is_none());
        assert_eq!(reader.blocks_read(), 2);
    }

    #[test]
    fn reads_version_2_file_with_checksum() {
        let data = v2_file();
        let reader = ShowFileReader::from_bytes(&data).unwrap();
        assert_eq!(reader.version(), 2);
        assert_eq!(reader.features(), FileFeatures::CRC32);

        let blocks = reader.read_all_blocks().unwrap();
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            [BlockType::Trajectory, BlockType::Comment, BlockType::YawControl]
        );
        assert_eq!(blocks[1].text().unwrap(), "this is a test file");
        assert_eq!(blocks[2].payload, b"\x01\x08\x02");
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut data = v2_file();
        data[6] = 0;
        let err = ShowFileReader::from_bytes(&data).err().unwrap();
        assert!(matches!(err, ShowError::ChecksumMismatch { .. }));
        assert!(err.to_string().starts_with("CRC error"));

        let config = ShowConfig {
            validate_checksum: false,
            ..ShowConfig::default()
        };
        let reader = ShowFileReader::from_bytes_with_config(&data, &config).unwrap();
        assert_eq!(reader.read_all_blocks().unwrap().len(), 3);
    }

    #[test]
    fn streaming_reader_checks_crc_at_end() {
        let data = v2_file();
        let blocks = ShowFileReader::from_reader(data.as_slice())
            .unwrap()
            .read_all_blocks()
            .unwrap();
        assert_eq!(blocks.len(), 3);

        let mut corrupted = v2_file();
        corrupted[6] = 0;
        let results: Vec<_> = ShowFileReader::from_reader(corrupted.as_slice())
            .unwrap()
            .blocks()
            .collect();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(matches!(
            results[3],
            Err(ShowError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unread_blocks_are_skipped() {
        let data = v2_file();
        let mut reader = ShowFileReader::from_reader(data.as_slice()).unwrap();
        let mut kinds = Vec::new();
        while let Some(block) = reader.next_block().unwrap() {
            kinds.push(block.kind());
        }
        assert_eq!(kinds.len(), 3);
    }

    #[test]
    fn unknown_blocks_are_preserved() {
        let data = [b"skyb\x01".as_slice(), b"\x2a\x02\x00\xbe\xef", COMMENT_BLOCK].concat();
        let blocks = ShowFileReader::from_bytes(&data)
            .unwrap()
            .read_all_blocks()
            .unwrap();
        assert_eq!(blocks[0], RawBlock::new(BlockType::Unknown(42), *b"\xbe\xef"));
        assert_eq!(blocks[1].kind, BlockType::Comment);
    }

    #[test]
    fn bad_headers_are_rejected() {
        let err = ShowFileReader::from_bytes(b"skyx\x01").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = ShowFileReader::from_bytes(b"sk").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = ShowFileReader::from_bytes(b"skyb").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = ShowFileReader::from_bytes(b"skyb\x07").err().unwrap();
        assert_eq!(err, ShowError::UnsupportedVersion { found: 7 });
    }

    #[test]
    fn truncated_blocks_are_rejected() {
        let data = v1_file();

        let mut reader = ShowFileReader::from_bytes(&data[..data.len() - 3]).unwrap();
        reader.next_block().unwrap().unwrap();
        let err = reader.next_block().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(reader.next_block().unwrap().is_none());

        let mut reader = ShowFileReader::from_bytes(&data[..7]).unwrap();
        assert_eq!(reader.next_block().err().unwrap().kind(), ErrorKind::Format);

        let mut reader = ShowFileReader::from_reader(&data[..data.len() - 3]).unwrap();
        reader.next_block().unwrap().unwrap();
        let block = reader.next_block().unwrap().unwrap();
        assert_eq!(block.read().unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn decodes_trajectory_blocks() {
        let data = v1_file();
        let blocks = ShowFileReader::from_bytes(&data)
            .unwrap()
            .read_all_blocks()
            .unwrap();
        let trajectory = blocks[0].trajectory().unwrap();
        assert_eq!(trajectory.waypoints().len(), 6);
        assert!(blocks[1].trajectory().is_err());
        assert_eq!(blocks[0].text().unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn into_inner_returns_source() {
        let data = v1_file();
        let mut reader = ShowFileReader::from_bytes(&data).unwrap();
        reader.next_block().unwrap().unwrap().skip().unwrap();
        let source = reader.into_inner();
        assert_eq!(source.rest(), COMMENT_BLOCK);
    }
}
