//! Decoder for the payload of trajectory blocks.
//!
//! See [`encoding`](super::encoding) for the layout.

use super::encoding::AxisFormat;
use super::{Point, TrajectorySpecification, Waypoint, TRAJECTORY_VERSION};
use crate::error::ShowError;

/// Reads little-endian values from a payload, failing on truncation.
struct Cursor<'a> {
    data: &'a [u8],
}

impl Cursor<'_> {
    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn u8(&mut self) -> Result<u8, ShowError> {
        let (&byte, rest) = self
            .data
            .split_first()
            .ok_or_else(|| ShowError::bad_format("truncated trajectory block"))?;
        self.data = rest;
        Ok(byte)
    }

    fn take2(&mut self) -> Result<[u8; 2], ShowError> {
        match self.data {
            [a, b, rest @ ..] => {
                self.data = rest;
                Ok([*a, *b])
            }
            _ => Err(ShowError::bad_format("truncated trajectory block")),
        }
    }

    fn u16(&mut self) -> Result<u16, ShowError> {
        self.take2().map(u16::from_le_bytes)
    }

    fn i16(&mut self) -> Result<i16, ShowError> {
        self.take2().map(i16::from_le_bytes)
    }
}

/// Decodes the payload of a trajectory block.
///
/// The result has a takeoff time of zero and waypoint times measured from
/// the start of the show. Segments whose axes use different formats are
/// lifted to the highest degree among them, so a segment either has no
/// control points or two.
pub fn decode_trajectory(payload: &[u8]) -> Result<TrajectorySpecification, ShowError> {
    let mut cursor = Cursor { data: payload };

    let scale = cursor.u8()?;
    if scale & 0x80 != 0 || scale == 0 {
        return Err(ShowError::bad_format(format!(
            "invalid scaling factor in trajectory block: {scale}"
        )));
    }
    let scale = f64::from(scale);

    let mut waypoints = Vec::new();
    if cursor.is_empty() {
        return TrajectorySpecification::new(TRAJECTORY_VERSION.into(), waypoints, 0.0);
    }

    let mut current = [cursor.i16()?, cursor.i16()?, cursor.i16()?];
    let _yaw = cursor.i16()?;
    waypoints.push(Waypoint::new(0.0, to_point(current, scale)));

    let mut elapsed_ms: u64 = 0;
    while !cursor.is_empty() {
        let header = cursor.u8()?;
        elapsed_ms += u64::from(cursor.u16()?);

        let mut axes: [Vec<i16>; 3] = Default::default();
        for (axis, coords) in axes.iter_mut().enumerate() {
            let format = AxisFormat::from_bits(header >> (2 * axis));
            if format == AxisFormat::Polynomial7 {
                return Err(ShowError::UnsupportedEncoding {
                    reason: "7th degree trajectory segments are not supported".into(),
                });
            }
            for _ in 0..format.coordinate_count() {
                coords.push(cursor.i16()?);
            }
        }

        let degree = axes.iter().map(Vec::len).max().unwrap_or(0);
        let mut curves: [Vec<i16>; 3] = Default::default();
        for (axis, coords) in axes.iter().enumerate() {
            curves[axis] = lift(current[axis], coords, degree);
        }

        let end = [
            curves[0].last().copied().unwrap_or(current[0]),
            curves[1].last().copied().unwrap_or(current[1]),
            curves[2].last().copied().unwrap_or(current[2]),
        ];
        let control_points = if degree > 1 {
            (0..degree - 1)
                .map(|i| {
                    to_point([curves[0][i], curves[1][i], curves[2][i]], scale)
                })
                .collect()
        } else {
            Vec::new()
        };

        waypoints.push(
            Waypoint::new(elapsed_ms as f64 / 1000.0, to_point(end, scale))
                .with_control_points(control_points),
        );
        current = end;
    }

    TrajectorySpecification::new(TRAJECTORY_VERSION.into(), waypoints, 0.0)
}

/// Lifts the stored coordinates of one axis to `degree` values (control
/// points followed by the end). Constant axes repeat the current value;
/// linear axes get evenly spaced control points.
fn lift(current: i16, coords: &[i16], degree: usize) -> Vec<i16> {
    match (coords, degree) {
        (_, 0) => Vec::new(),
        ([], n) => vec![current; n],
        ([end], 3) => {
            let (start, end) = (f64::from(current), f64::from(*end));
            vec![
                (start + (end - start) / 3.0).round() as i16,
                (start + 2.0 * (end - start) / 3.0).round() as i16,
                end as i16,
            ]
        }
        (coords, _) => coords.to_vec(),
    }
}

fn to_point(raw: [i16; 3], scale: f64) -> Point {
    raw.map(|coord| f64::from(coord) * scale / 1000.0)
}
