//! Decoder for the payload of yaw control blocks.
//!
//! See [`encoding`](super::encoding) for the layout.

use super::encoding::AUTO_YAW_FLAG;
use super::{YawSetpoint, YawSetpointList};
use crate::error::ShowError;

/// Decodes the payload of a yaw control block.
///
/// Relative steps are accumulated into absolute setpoints starting at time
/// zero from the stored yaw offset, so split steps come back as separate
/// setpoints.
pub fn decode_yaw_setpoints(payload: &[u8]) -> Result<YawSetpointList, ShowError> {
    let Some(([flags, lo, hi], body)) = payload.split_first_chunk::<3>().map(|(h, b)| (*h, b)) else {
        return Err(ShowError::bad_format("truncated yaw control block"));
    };
    if flags & !AUTO_YAW_FLAG != 0 {
        return Err(ShowError::bad_format(format!(
            "unknown flags in yaw control block: {flags:#04x}"
        )));
    }
    let offset = f64::from(i16::from_le_bytes([lo, hi])) / 10.0;

    if flags & AUTO_YAW_FLAG != 0 {
        if !body.is_empty() {
            return Err(ShowError::bad_format(
                "auto yaw control block must not have setpoints",
            ));
        }
        return Ok(YawSetpointList::auto(offset));
    }

    let steps = body.chunks_exact(4);
    if !steps.remainder().is_empty() {
        return Err(ShowError::bad_format("truncated yaw setpoint"));
    }

    // Milliseconds and decidegrees are summed as integers so long lists do
    // not accumulate rounding errors.
    let mut millis: u64 = 0;
    let mut tenths = i64::from(i16::from_le_bytes([lo, hi]));
    let setpoints: Vec<_> = steps
        .map(|step| {
            millis += u64::from(u16::from_le_bytes([step[0], step[1]]));
            tenths += i64::from(i16::from_le_bytes([step[2], step[3]]));
            YawSetpoint::new(millis as f64 / 1000.0, tenths as f64 / 10.0)
        })
        .collect();

    if setpoints.is_empty() && offset != 0.0 {
        return Err(ShowError::bad_format(
            "yaw control block without setpoints must have zero offset",
        ));
    }
    YawSetpointList::new(setpoints, false, 0.0)
}
