//! Encoder for the payload of trajectory blocks.
//!
//! Layout of a payload:
//!
//! ```text
//! [SCALE u8] [START x,y,z,yaw: i16 x4] [SEGMENT]*
//! SEGMENT = [FORMATS u8] [DURATION_MS u16] [X coords] [Y coords] [Z coords]
//! ```
//!
//! All integers are little-endian. Coordinates are millimeters divided by
//! the scale. The format of each axis takes two bits of the `FORMATS` byte
//! (x in bits 0-1, y in bits 2-3, z in bits 4-5) and decides how many
//! coordinates follow for that axis; the start point of a segment is the end
//! point of the previous one and is never repeated.

use log::debug;

use super::segment::TrajectorySegment;
use super::{Point, TrajectorySpecification};
use crate::config::ShowConfig;
use crate::error::ShowError;

/// Per-axis encoding of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AxisFormat {
    /// No coordinates, the axis stays where it was.
    Constant = 0,
    /// End coordinate only.
    Linear = 1,
    /// Two control points and the end coordinate.
    Cubic = 2,
    /// Six control points and the end coordinate.
    Polynomial7 = 3,
}

impl AxisFormat {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Constant,
            1 => Self::Linear,
            2 => Self::Cubic,
            _ => Self::Polynomial7,
        }
    }

    /// Number of coordinates stored for the axis.
    pub fn coordinate_count(self) -> usize {
        match self {
            Self::Constant => 0,
            Self::Linear => 1,
            Self::Cubic => 3,
            Self::Polynomial7 => 7,
        }
    }
}

/// Encodes points and segments at a fixed scale.
#[derive(Clone, Copy, Debug)]
pub struct SegmentEncoder {
    multiplier: f64,
}

impl SegmentEncoder {
    /// Coordinates are multiplied by `1000 / scale` and truncated towards
    /// zero. Truncation keeps the extremes that
    /// [`propose_scaling_factor`](TrajectorySpecification::propose_scaling_factor)
    /// sized the scale for inside the `i16` range.
    pub fn new(scale: u32) -> Result<Self, ShowError> {
        if scale == 0 {
            return Err(ShowError::out_of_range("scaling factor must be positive"));
        }
        Ok(Self {
            multiplier: 1000.0 / f64::from(scale),
        })
    }

    /// Encodes x, y, z and yaw (in degrees) of a point.
    pub fn encode_point(&self, point: Point, yaw: f64) -> Result<[u8; 8], ShowError> {
        let [x, y, z] = self.scale_point(point)?;
        let yaw = scale_yaw(yaw);
        let mut out = [0u8; 8];
        for (chunk, value) in out.chunks_exact_mut(2).zip([x, y, z, yaw]) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(out)
    }

    /// Encodes a segment without its start point.
    pub fn encode_segment(&self, segment: &TrajectorySegment) -> Result<Vec<u8>, ShowError> {
        let duration = (segment.duration * 1000.0).floor();
        if !(0.0..=f64::from(u16::MAX)).contains(&duration) {
            return Err(ShowError::out_of_range(format!(
                "trajectory segment must be in the range 0-65535 msec, got {duration} msec"
            )));
        }

        let scaled = segment
            .points
            .iter()
            .map(|p| self.scale_point(*p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut header = 0u8;
        let mut body = Vec::with_capacity(3 * 7 * 2);
        for axis in 0..3 {
            let series: Vec<i16> = scaled.iter().map(|p| p[axis]).collect();
            let (format, coords) = encode_coordinate_series(&series)?;
            header |= (format as u8) << (2 * axis);
            for coord in coords {
                body.extend_from_slice(&coord.to_le_bytes());
            }
        }

        let mut out = Vec::with_capacity(3 + body.len());
        out.push(header);
        // Range checked above.
        out.extend_from_slice(&(duration as u16).to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Encodes a continuous curve: the start point of the first segment,
    /// then every segment without its start point. Returns an empty buffer
    /// when there are no segments.
    pub fn encode_segments<'a, I>(&self, segments: I) -> Result<Vec<u8>, ShowError>
    where
        I: IntoIterator<Item = &'a TrajectorySegment>,
    {
        let mut out = Vec::new();
        let mut first = true;
        for segment in segments {
            if first {
                out.extend_from_slice(&self.encode_point(segment.start(), 0.0)?);
                first = false;
            }
            out.extend_from_slice(&self.encode_segment(segment)?);
        }
        Ok(out)
    }

    fn scale_point(&self, point: Point) -> Result<[i16; 3], ShowError> {
        let mut out = [0i16; 3];
        for (slot, coord) in out.iter_mut().zip(point) {
            let scaled = (coord * self.multiplier).trunc();
            if !(f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&scaled) {
                return Err(ShowError::out_of_range(format!(
                    "coordinate {coord} does not fit into a trajectory block at this scale"
                )));
            }
            *slot = scaled as i16;
        }
        Ok(out)
    }
}

/// Yaw in tenths of degrees, normalized into `[0, 3600)`.
fn scale_yaw(yaw: f64) -> i16 {
    let tenths = (yaw.rem_euclid(360.0) * 10.0).round_ties_even();
    let tenths = if tenths >= 3600.0 { tenths - 3600.0 } else { tenths };
    tenths as i16
}

/// Picks the format of one axis given all coordinates of a segment,
/// including the start point, and returns the coordinates to store.
fn encode_coordinate_series(series: &[i16]) -> Result<(AxisFormat, Vec<i16>), ShowError> {
    let Some((&first, rest)) = series.split_first() else {
        return Ok((AxisFormat::Constant, Vec::new()));
    };
    if rest.iter().all(|&x| x == first) {
        return Ok((AxisFormat::Constant, Vec::new()));
    }

    let coords = match *rest {
        // Quadratic curves are promoted to cubic ones.
        [control, end] => {
            let (first, control, end) = (f64::from(first), f64::from(control), f64::from(end));
            vec![
                ((first + 2.0 * control) / 3.0).round() as i16,
                ((2.0 * control + end) / 3.0).round() as i16,
                end as i16,
            ]
        }
        _ => rest.to_vec(),
    };

    let format = match coords.len() {
        1 => AxisFormat::Linear,
        3 => AxisFormat::Cubic,
        7 => AxisFormat::Polynomial7,
        n => {
            return Err(ShowError::UnsupportedEncoding {
                reason: format!("curves of degree {n} cannot be stored in a trajectory block"),
            })
        }
    };
    Ok((format, coords))
}

/// Encodes a whole trajectory into the payload of a trajectory block.
///
/// Times are written on an absolute axis starting at zero: a constant
/// segment is prepended when the first waypoint comes later than that, and
/// every segment is cut into pieces shorter than
/// [`ShowConfig::max_segment_duration`].
pub fn encode_trajectory(
    trajectory: &TrajectorySpecification,
    config: &ShowConfig,
) -> Result<Vec<u8>, ShowError> {
    let scale = trajectory.propose_scaling_factor();
    if scale > config.max_scaling_factor || scale > 127 {
        return Err(ShowError::out_of_range(
            "trajectory covers too large an area for a Skybrush binary show file",
        ));
    }

    // MSB of the scale byte is reserved as zero.
    let mut out = vec![scale as u8];
    let Some(first) = trajectory.waypoints().first() else {
        return Ok(out);
    };

    let encoder = SegmentEncoder::new(scale)?;
    let takeoff = trajectory.takeoff_time();

    let mut segments = Vec::new();
    let start = takeoff + first.time;
    if start > 0.0 {
        let hold = TrajectorySegment::constant(0.0, start, first.position);
        segments.extend(hold.split_to_max_duration(config.max_segment_duration)?);
    }
    for mut segment in trajectory.checked_segments()? {
        segment.start_time += takeoff;
        segments.extend(segment.split_to_max_duration(config.max_segment_duration)?);
    }

    out.extend_from_slice(&encoder.encode_point(first.position, 0.0)?);
    for segment in &segments {
        out.extend_from_slice(&encoder.encode_segment(segment)?);
    }

    debug!(
        "encoded trajectory with {} segments at scale {scale} into {} bytes",
        segments.len(),
        out.len()
    );
    Ok(out)
}
