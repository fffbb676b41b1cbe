//! Flockwave Show Core (transport-agnostic)
//!
//! Reading and writing of Skybrush binary show files, trajectory
//! specifications and their playback. Device adapters call
//! [`TrajectoryPlayer::position_at`] once per control tick and
//! [`TrajectoryPlayer::is_before_takeoff`] to decide between holding in place
//! and flying the scripted path.

pub mod bbox;
pub mod config;
pub mod error;
pub mod format;
pub mod player;
pub mod rth;
pub mod show;
pub mod trajectory;
pub mod varint;
pub mod yaw;

// Re-exports for consumers (adapters)
pub use bbox::BoundingBox;
pub use config::ShowConfig;
pub use error::{ErrorKind, ShowError};
pub use format::{
    Block, BlockSource, BlockType, FileFeatures, RawBlock, ShowFileBuilder, ShowFileReader,
    SliceSource, StreamSource,
};
pub use player::{PlaybackPhase, TrajectoryPlayer};
pub use rth::{RthAction, RthPlan, RthPlanEntry};
pub use show::ShowSpecification;
pub use trajectory::{
    DefaultGeometryPolicy, GeometryPolicy, Point, TrajectorySegment, TrajectorySpecification,
    Waypoint,
};
pub use varint::{decode_varint, encode_varint};
pub use yaw::{RelativeYawSetpoint, YawSetpoint, YawSetpointList};
