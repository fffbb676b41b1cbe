//! In-memory construction of show files.

use log::trace;

use super::checksum::{self, CHECKSUM_LEN};
use super::reader::RawBlock;
use super::{BlockType, FileFeatures, MAGIC, MAX_BLOCK_LEN, MAX_FORMAT_VERSION, MIN_FORMAT_VERSION};
use crate::config::ShowConfig;
use crate::error::ShowError;
use crate::rth::{encoding::encode_rth_plan, RthPlan};
use crate::trajectory::{encoding, TrajectorySpecification};
use crate::yaw::{encoding::encode_yaw_setpoints, YawSetpointList};

/// Builds a show file block by block.
///
/// The header is written eagerly; every `add_*` call appends exactly one
/// block. [`contents`](Self::contents) can be called at any time and reflects
/// the blocks added so far.
#[derive(Clone, Debug)]
pub struct ShowFileBuilder {
    buffer: Vec<u8>,
    version: u8,
    features: FileFeatures,
    crc_offset: Option<usize>,
    block_count: usize,
    config: ShowConfig,
}

impl ShowFileBuilder {
    /// Starts a file with the given format version and default settings.
    ///
    /// Version 2 files get the features of [`ShowConfig::default`].
    pub fn new(version: u8) -> Result<Self, ShowError> {
        Self::with_config(&ShowConfig {
            version,
            ..ShowConfig::default()
        })
    }

    /// Starts a file using the version and features of `config`.
    pub fn with_config(config: &ShowConfig) -> Result<Self, ShowError> {
        let version = config.version;
        if !(MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&version) {
            return Err(ShowError::UnsupportedVersion { found: version });
        }

        let mut buffer = Vec::with_capacity(64);
        buffer.extend_from_slice(&MAGIC);
        buffer.push(version);

        let mut features = FileFeatures::empty();
        let mut crc_offset = None;
        if version >= 2 {
            features = config.features;
            buffer.push(features.bits());
            if features.contains(FileFeatures::CRC32) {
                crc_offset = Some(buffer.len());
                buffer.extend_from_slice(&[0u8; CHECKSUM_LEN]);
            }
        }

        Ok(Self {
            buffer,
            version,
            features,
            crc_offset,
            block_count: 0,
            config: config.clone(),
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn features(&self) -> FileFeatures {
        self.features
    }

    /// Number of blocks added so far.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Appends a block with an arbitrary type tag.
    pub fn add_block(&mut self, kind: BlockType, payload: &[u8]) -> Result<(), ShowError> {
        if payload.len() > MAX_BLOCK_LEN {
            return Err(ShowError::out_of_range(format!(
                "block body too large: {} bytes, at most {MAX_BLOCK_LEN} allowed",
                payload.len()
            )));
        }

        // Checked above, cannot truncate.
        let len = payload.len() as u16;
        self.buffer.push(kind.tag());
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(payload);
        self.block_count += 1;

        trace!("added block {kind:?} of {len} bytes");
        Ok(())
    }

    /// Appends a block that was read from another file, unchanged.
    pub fn add_raw_block(&mut self, block: &RawBlock) -> Result<(), ShowError> {
        self.add_block(block.kind, &block.payload)
    }

    /// Appends a comment block holding the UTF-8 bytes of `text`.
    pub fn add_comment(&mut self, text: &str) -> Result<(), ShowError> {
        self.add_block(BlockType::Comment, text.as_bytes())
    }

    /// Appends an already encoded light program.
    pub fn add_light_program(&mut self, program: &[u8]) -> Result<(), ShowError> {
        self.add_block(BlockType::LightProgram, program)
    }

    /// Encodes `trajectory` and appends it as a trajectory block.
    pub fn add_trajectory(&mut self, trajectory: &TrajectorySpecification) -> Result<(), ShowError> {
        let payload = encoding::encode_trajectory(trajectory, &self.config)?;
        self.add_block(BlockType::Trajectory, &payload)
    }

    /// Encodes `plan` and appends it as an RTH plan block.
    pub fn add_rth_plan(&mut self, plan: &RthPlan) -> Result<(), ShowError> {
        let payload = encode_rth_plan(plan, &self.config)?;
        self.add_block(BlockType::RthPlan, &payload)
    }

    /// Encodes `setpoints` and appends them as a yaw control block.
    pub fn add_yaw_setpoints(&mut self, setpoints: &YawSetpointList) -> Result<(), ShowError> {
        let payload = encode_yaw_setpoints(setpoints)?;
        self.add_block(BlockType::YawControl, &payload)
    }

    /// The file as built so far, with its checksum filled in.
    pub fn contents(&self) -> Vec<u8> {
        let mut contents = self.buffer.clone();
        self.seal(&mut contents);
        contents
    }

    /// Finishes the file and returns its bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        let mut contents = std::mem::take(&mut self.buffer);
        self.seal(&mut contents);
        contents
    }

    fn seal(&self, contents: &mut [u8]) {
        if let Some(offset) = self.crc_offset {
            let crc = checksum::file_checksum(contents, offset);
            contents[offset..offset + CHECKSUM_LEN].copy_from_slice(&crc.to_le_bytes());
        }
    }
}
