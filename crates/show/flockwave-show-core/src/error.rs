//! Error types for show files and trajectories

use serde::{Deserialize, Serialize};

/// Coarse classification of a [`ShowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed container or trajectory data.
    Format,
    /// A numeric argument outside of its allowed domain.
    Range,
    /// An argument that is not of the expected kind (e.g. not an integer).
    Type,
    /// A geometric query on something that holds no data yet.
    EmptyState,
    /// Failure of the underlying byte source or sink.
    Io,
}

/// Error type for every fallible operation in this crate
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ShowError {
    /// The bytes do not form a valid show file
    #[error("Bad show file format: {reason}")]
    BadFormat { reason: String },

    /// The header declares a format version this build cannot read or write
    #[error("Unsupported show file version: {found}")]
    UnsupportedVersion { found: u8 },

    /// The stored checksum does not match the contents
    #[error("CRC error, expected {expected:08x}, got {observed:08x}")]
    ChecksumMismatch { expected: u32, observed: u32 },

    /// Trajectory data is missing mandatory fields or is inconsistent
    #[error("Invalid trajectory: {reason}")]
    InvalidTrajectory { reason: String },

    /// A block payload uses an encoding this build does not understand
    #[error("Unsupported encoding: {reason}")]
    UnsupportedEncoding { reason: String },

    /// Numeric value outside of its allowed range
    #[error("Value out of range: {reason}")]
    OutOfRange { reason: String },

    /// Value of the wrong type
    #[error("Invalid type: {reason}")]
    InvalidType { reason: String },

    /// Query on an object that holds no data
    #[error("{what} is empty")]
    Empty { what: String },

    /// IO error
    #[error("IO error: {reason}")]
    IoError { reason: String },
}

impl ShowError {
    /// Shorthand for [`ShowError::BadFormat`]
    pub fn bad_format(reason: impl Into<String>) -> Self {
        Self::BadFormat {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ShowError::InvalidTrajectory`]
    pub fn invalid_trajectory(reason: impl Into<String>) -> Self {
        Self::InvalidTrajectory {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ShowError::OutOfRange`]
    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ShowError::Empty`]
    pub fn empty(what: impl Into<String>) -> Self {
        Self::Empty { what: what.into() }
    }

    /// Maps the error to one of the coarse error kinds
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadFormat { .. }
            | Self::UnsupportedVersion { .. }
            | Self::ChecksumMismatch { .. }
            | Self::InvalidTrajectory { .. }
            | Self::UnsupportedEncoding { .. } => ErrorKind::Format,
            Self::OutOfRange { .. } => ErrorKind::Range,
            Self::InvalidType { .. } => ErrorKind::Type,
            Self::Empty { .. } => ErrorKind::EmptyState,
            Self::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::BadFormat { .. }
            | Self::UnsupportedVersion { .. }
            | Self::ChecksumMismatch { .. } => "container",
            Self::InvalidTrajectory { .. } | Self::UnsupportedEncoding { .. } => "trajectory",
            Self::OutOfRange { .. } | Self::InvalidType { .. } => "validation",
            Self::Empty { .. } => "geometry",
            Self::IoError { .. } => "io",
        }
    }
}

impl From<std::io::Error> for ShowError {
    fn from(err: std::io::Error) -> Self {
        // Running out of bytes in the middle of a header or a block is a
        // property of the file, not of the transport.
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::bad_format("unexpected end of block in Skybrush file")
        } else {
            Self::IoError {
                reason: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ShowError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidTrajectory {
            reason: err.to_string(),
        }
    }
}
