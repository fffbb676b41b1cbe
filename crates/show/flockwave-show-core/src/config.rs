//! Configuration for reading and writing show files.

use serde::{Deserialize, Serialize};

use crate::format::FileFeatures;

/// Knobs shared by [`ShowFileReader`](crate::format::ShowFileReader),
/// [`ShowFileBuilder`](crate::format::ShowFileBuilder) and the trajectory
/// block encoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    /// Format version of newly created show files.
    pub version: u8,

    /// Optional features of newly created version 2 files.
    pub features: FileFeatures,

    /// Whether readers verify the CRC of files that declare one.
    pub validate_checksum: bool,

    /// Longest segment duration (seconds) written into a trajectory block.
    /// Longer segments are split into equal pieces.
    pub max_segment_duration: f64,

    /// Largest scaling factor that still fits in a trajectory block header.
    pub max_scaling_factor: u32,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            version: 2,
            features: FileFeatures::CRC32,
            validate_checksum: true,
            max_segment_duration: 65.0,
            max_scaling_factor: 127,
        }
    }
}

impl ShowConfig {
    /// Configuration that produces version 1 files (no feature byte, no CRC).
    pub fn legacy() -> Self {
        Self {
            version: 1,
            features: FileFeatures::empty(),
            ..Self::default()
        }
    }
}
