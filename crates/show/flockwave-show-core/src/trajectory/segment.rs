//! Segments between consecutive waypoints.
//!
//! A segment with two points is a straight line; with more points it is a
//! Bézier curve whose inner points are the control points.

use super::{Point, Waypoint};
use crate::error::ShowError;

/// Curves up to this many points are evaluated without allocating.
const INLINE_POINTS: usize = 8;

/// A single piece of a trajectory.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectorySegment {
    /// Start time in seconds.
    pub start_time: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Start point, control points, end point.
    pub points: Vec<Point>,
}

impl TrajectorySegment {
    pub fn new(start_time: f64, duration: f64, points: Vec<Point>) -> Self {
        Self {
            start_time,
            duration,
            points,
        }
    }

    /// The segment that leads from `from` to `to`, using the control points
    /// of `to`.
    pub fn between(from: &Waypoint, to: &Waypoint) -> Self {
        let mut points = Vec::with_capacity(to.control_points.len() + 2);
        points.push(from.position);
        points.extend_from_slice(&to.control_points);
        points.push(to.position);
        Self::new(from.time, to.time - from.time, points)
    }

    /// Segment that stays at `point` for `duration` seconds.
    pub fn constant(start_time: f64, duration: f64, point: Point) -> Self {
        Self::new(start_time, duration, vec![point, point])
    }

    #[inline]
    pub fn has_control_points(&self) -> bool {
        self.points.len() > 2
    }

    pub fn start(&self) -> Point {
        self.points.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> Point {
        self.points.last().copied().unwrap_or_default()
    }

    #[inline]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Point of the segment at `ratio` of its duration.
    ///
    /// Ratios are clamped to `[0, 1]`; the endpoints are returned exactly.
    pub fn evaluate(&self, ratio: f64) -> Point {
        if ratio <= 0.0 {
            return self.start();
        }
        if ratio >= 1.0 {
            return self.end();
        }
        match self.points.as_slice() {
            [] => [0.0; 3],
            [only] => *only,
            [start, end] => lerp(*start, *end, ratio),
            points => de_casteljau(points, ratio),
        }
    }

    /// Splits the segment at `fraction` of its duration.
    ///
    /// Splitting at 0 yields a zero-length head holding only the start point;
    /// splitting at 1 yields a zero-length tail holding only the end point.
    pub fn split_at(&self, fraction: f64) -> Result<(Self, Self), ShowError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ShowError::out_of_range(format!(
                "fraction must be between 0 and 1, got {fraction}"
            )));
        }

        if fraction == 0.0 {
            let head = Self::new(self.start_time, 0.0, vec![self.start()]);
            return Ok((head, self.clone()));
        }
        if fraction == 1.0 {
            let tail = Self::new(self.end_time(), 0.0, vec![self.end()]);
            return Ok((self.clone(), tail));
        }

        let mut work = self.points.clone();
        let mut left = Vec::with_capacity(work.len());
        let mut right = Vec::with_capacity(work.len());
        while let (Some(first), Some(last)) = (work.first().copied(), work.last().copied()) {
            left.push(first);
            right.push(last);
            for i in 0..work.len() - 1 {
                work[i] = lerp(work[i], work[i + 1], fraction);
            }
            work.pop();
        }
        right.reverse();

        let head_duration = self.duration * fraction;
        Ok((
            Self::new(self.start_time, head_duration, left),
            Self::new(
                self.start_time + head_duration,
                self.duration - head_duration,
                right,
            ),
        ))
    }

    /// Splits the segment into equal pieces, each strictly shorter than
    /// `max_duration`.
    pub fn split_to_max_duration(&self, max_duration: f64) -> Result<Vec<Self>, ShowError> {
        if max_duration.is_nan() || max_duration <= 0.0 {
            return Err(ShowError::out_of_range(format!(
                "maximum duration must be positive, got {max_duration}"
            )));
        }
        if !self.duration.is_finite() {
            return Err(ShowError::out_of_range(format!(
                "cannot split a segment of duration {}",
                self.duration
            )));
        }

        let pieces = (self.duration / max_duration).floor() as usize + 1;
        let mut result = Vec::with_capacity(pieces);
        let mut rest = self.clone();
        for done in 0..pieces - 1 {
            let (head, tail) = rest.split_at(1.0 / (pieces - done) as f64)?;
            result.push(head);
            rest = tail;
        }
        result.push(rest);
        Ok(result)
    }
}

#[inline]
pub(crate) fn lerp(a: Point, b: Point, ratio: f64) -> Point {
    [
        a[0] + (b[0] - a[0]) * ratio,
        a[1] + (b[1] - a[1]) * ratio,
        a[2] + (b[2] - a[2]) * ratio,
    ]
}

fn de_casteljau(points: &[Point], ratio: f64) -> Point {
    if points.len() <= INLINE_POINTS {
        let mut scratch = [[0.0; 3]; INLINE_POINTS];
        scratch[..points.len()].copy_from_slice(points);
        reduce(&mut scratch[..points.len()], ratio)
    } else {
        reduce(&mut points.to_vec(), ratio)
    }
}

fn reduce(work: &mut [Point], ratio: f64) -> Point {
    for len in (1..work.len()).rev() {
        for i in 0..len {
            work[i] = lerp(work[i], work[i + 1], ratio);
        }
    }
    work.first().copied().unwrap_or_default()
}
