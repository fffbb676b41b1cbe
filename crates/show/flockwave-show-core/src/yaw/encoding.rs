//! Encoder for the payload of yaw control blocks.
//!
//! Layout of a payload:
//!
//! ```text
//! [FLAGS u8] [YAW_OFFSET i16] ([DURATION_MS u16] [YAW_CHANGE i16])*
//! ```
//!
//! All integers are little-endian and angles are tenths of degrees. Bit 0 of
//! `FLAGS` selects auto yaw, in which case no setpoints follow.

use log::debug;

use super::YawSetpointList;
use crate::error::ShowError;

pub(crate) const AUTO_YAW_FLAG: u8 = 0x01;

/// Longest step (seconds) of a single stored setpoint.
pub const MAX_SETPOINT_DURATION: f64 = 65.0;

/// Largest turn (degrees) of a single stored setpoint.
pub const MAX_SETPOINT_YAW_CHANGE: f64 = 3200.0;

fn to_decidegrees(degrees: f64, what: &str) -> Result<i16, ShowError> {
    let tenths = (degrees * 10.0).round_ties_even();
    if !(f64::from(-i16::MAX)..=f64::from(i16::MAX)).contains(&tenths) {
        return Err(ShowError::out_of_range(format!(
            "{what} must be smaller than 3276.8 deg, got {degrees} deg"
        )));
    }
    Ok(tenths as i16)
}

pub fn encode_header(auto_yaw: bool, yaw_offset: f64) -> Result<[u8; 3], ShowError> {
    let flags = if auto_yaw { AUTO_YAW_FLAG } else { 0 };
    let [lo, hi] = to_decidegrees(yaw_offset, "yaw offset")?.to_le_bytes();
    Ok([flags, lo, hi])
}

pub fn encode_relative_setpoint(duration: f64, yaw_change: f64) -> Result<[u8; 4], ShowError> {
    let millis = (duration * 1000.0).floor();
    if !(0.0..=f64::from(u16::MAX)).contains(&millis) {
        return Err(ShowError::out_of_range(format!(
            "yaw setpoint duration must be in the range 0-65535 msec, got {millis} msec"
        )));
    }
    let change = to_decidegrees(yaw_change, "relative yaw setpoint")?;

    let mut out = [0u8; 4];
    // Range checked above.
    out[..2].copy_from_slice(&(millis as u16).to_le_bytes());
    out[2..].copy_from_slice(&change.to_le_bytes());
    Ok(out)
}

/// Encodes a yaw setpoint list into the payload of a yaw control block.
pub fn encode_yaw_setpoints(setpoints: &YawSetpointList) -> Result<Vec<u8>, ShowError> {
    let mut out = encode_header(setpoints.auto_yaw(), setpoints.yaw_offset())?.to_vec();
    if !setpoints.auto_yaw() {
        for step in setpoints.relative_setpoints(MAX_SETPOINT_DURATION, MAX_SETPOINT_YAW_CHANGE) {
            out.extend_from_slice(&encode_relative_setpoint(step.duration, step.yaw_change)?);
        }
    }
    debug!(
        "encoded {} yaw setpoints into {} bytes",
        setpoints.setpoints().len(),
        out.len()
    );
    Ok(out)
}
