//! Skybrush binary show file container.
//!
//! # Layout
//!
//! ```text
//! [MAGIC "skyb"] [VERSION u8] ([FEATURES u8] [CRC32 u32]?)?
//! [Block 1] [Block 2] ... [Block N]
//! ```
//!
//! Version 1 files end their header after the version byte. Version 2 files
//! add a feature byte; when the `CRC32` feature is set, a little-endian
//! checksum of the whole file (with the checksum field taken as zeros)
//! follows. Every block is a `u8` type tag, a `u16` little-endian length and
//! exactly that many payload bytes, so readers can skip block types they do
//! not understand.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod checksum;
pub mod reader;
pub mod source;

pub use builder::ShowFileBuilder;
pub use checksum::crc32_mavftp;
pub use reader::{Block, Blocks, RawBlock, ShowFileReader};
pub use source::{BlockSource, SliceSource, StreamSource};

/// Magic bytes at the start of every show file.
pub const MAGIC: [u8; 4] = *b"skyb";

/// Oldest format version this build reads and writes.
pub const MIN_FORMAT_VERSION: u8 = 1;

/// Newest format version this build reads and writes.
///
/// History:
/// - v1: magic and version only
/// - v2: feature flags byte, optional CRC32 of the whole file
pub const MAX_FORMAT_VERSION: u8 = 2;

/// Size of the `(type, length)` prefix of every block.
pub const BLOCK_HEADER_LEN: usize = 3;

/// Largest payload a single block can carry.
pub const MAX_BLOCK_LEN: usize = u16::MAX as usize;

bitflags! {
    /// Optional features declared in the header of version 2 files.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileFeatures: u8 {
        /// The header carries a CRC32 checksum of the whole file.
        const CRC32 = 1;
    }
}

/// Type tag of a block.
///
/// Tags that this build does not know about are preserved in
/// [`BlockType::Unknown`] so they can be skipped or copied verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    Trajectory,
    LightProgram,
    Comment,
    RthPlan,
    YawControl,
    Unknown(u8),
}

impl BlockType {
    /// Raw tag as stored in the file.
    #[inline]
    pub fn tag(self) -> u8 {
        self.into()
    }

    /// Whether this build knows what the block contains.
    #[inline]
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u8> for BlockType {
    fn from(tag: u8) -> Self {
        match tag {
            1 => Self::Trajectory,
            2 => Self::LightProgram,
            3 => Self::Comment,
            4 => Self::RthPlan,
            5 => Self::YawControl,
            other => Self::Unknown(other),
        }
    }
}

impl From<BlockType> for u8 {
    fn from(kind: BlockType) -> Self {
        match kind {
            BlockType::Trajectory => 1,
            BlockType::LightProgram => 2,
            BlockType::Comment => 3,
            BlockType::RthPlan => 4,
            BlockType::YawControl => 5,
            BlockType::Unknown(tag) => tag,
        }
    }
}
