//! Time-to-position evaluation of a trajectory.
//!
//! [`TrajectoryPlayer`] answers "where should the drone be at time `t`?" for
//! any absolute time. It is a pure function of the trajectory and the query
//! time; the only state it keeps is a hint of the last segment used, which
//! speeds up monotonic queries without ever changing a result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::trajectory::{Point, TrajectorySegment, TrajectorySpecification};

/// Where the playback of a trajectory is at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackPhase {
    /// Before the takeoff time; the drone sits at its home position.
    BeforeTakeoff,
    /// After takeoff but before the first waypoint.
    HoldingAtStart,
    /// Moving along the segment with the given index.
    Moving { segment: usize },
    /// At or after the last waypoint.
    Ended,
}

/// Plays back a trajectory specification.
///
/// The specification is shared through an [`Arc`], so one player per drone
/// can be handed to any number of threads.
#[derive(Debug)]
pub struct TrajectoryPlayer {
    trajectory: Arc<TrajectorySpecification>,
    segments: Vec<TrajectorySegment>,
    /// Absolute start time of every segment, followed by the end time of
    /// the last one.
    start_times: Vec<f64>,
    home: Point,
    takeoff_time: f64,
    hint: AtomicUsize,
}

impl TrajectoryPlayer {
    pub fn new(trajectory: impl Into<Arc<TrajectorySpecification>>) -> Self {
        let trajectory = trajectory.into();
        let takeoff_time = trajectory.takeoff_time();
        let home = trajectory.home_position();

        let segments: Vec<_> = trajectory.segments().collect();
        let start_times = trajectory
            .waypoints()
            .iter()
            .map(|w| takeoff_time + w.time)
            .collect();

        Self {
            trajectory,
            segments,
            start_times,
            home,
            takeoff_time,
            hint: AtomicUsize::new(0),
        }
    }

    pub fn trajectory(&self) -> &Arc<TrajectorySpecification> {
        &self.trajectory
    }

    /// Absolute time of the first waypoint, or the takeoff time for an
    /// empty trajectory.
    pub fn start_time(&self) -> f64 {
        self.start_times.first().copied().unwrap_or(self.takeoff_time)
    }

    /// Absolute time of the last waypoint, or the takeoff time for an empty
    /// trajectory.
    pub fn end_time(&self) -> f64 {
        self.start_times.last().copied().unwrap_or(self.takeoff_time)
    }

    /// Whether `time` precedes the takeoff. A NaN time never reaches the
    /// takeoff, so it counts as before.
    #[inline]
    pub fn is_before_takeoff(&self, time: f64) -> bool {
        time < self.takeoff_time || time.is_nan()
    }

    /// Whether the trajectory has reached its last waypoint at `time`.
    pub fn has_ended_at(&self, time: f64) -> bool {
        !self.is_before_takeoff(time) && time >= self.end_time()
    }

    pub fn phase_at(&self, time: f64) -> PlaybackPhase {
        if self.is_before_takeoff(time) {
            PlaybackPhase::BeforeTakeoff
        } else if self.has_ended_at(time) {
            PlaybackPhase::Ended
        } else if time < self.start_time() {
            PlaybackPhase::HoldingAtStart
        } else {
            PlaybackPhase::Moving {
                segment: self.find_segment(time),
            }
        }
    }

    /// Position of the drone at `time`, in meters.
    pub fn position_at(&self, time: f64) -> Point {
        if self.is_before_takeoff(time) {
            return self.home;
        }
        let waypoints = self.trajectory.waypoints();
        let (Some(first), Some(last)) = (waypoints.first(), waypoints.last()) else {
            return self.home;
        };
        if time >= self.end_time() {
            return last.position;
        }
        if time < self.start_time() {
            return first.position;
        }

        let index = self.find_segment(time);
        let (Some(segment), Some(&start), Some(&end)) = (
            self.segments.get(index),
            self.start_times.get(index),
            self.start_times.get(index + 1),
        ) else {
            return last.position;
        };
        let length = end - start;
        let ratio = if length > 0.0 {
            (time - start) / length
        } else {
            0.0
        };
        segment.evaluate(ratio)
    }

    /// Index of the segment that contains `time`. Only valid when
    /// `start_time() <= time < end_time()`.
    fn find_segment(&self, time: f64) -> usize {
        let contains = |index: usize| {
            index < self.segments.len()
                && self.start_times[index] <= time
                && time < self.start_times[index + 1]
        };

        let hint = self.hint.load(Ordering::Relaxed);
        if contains(hint) {
            return hint;
        }
        if contains(hint + 1) {
            self.hint.store(hint + 1, Ordering::Relaxed);
            return hint + 1;
        }

        let index = self
            .start_times
            .partition_point(|start| *start <= time)
            .saturating_sub(1)
            .min(self.segments.len().saturating_sub(1));
        self.hint.store(index, Ordering::Relaxed);
        index
    }
}

impl Clone for TrajectoryPlayer {
    fn clone(&self) -> Self {
        Self {
            trajectory: Arc::clone(&self.trajectory),
            segments: self.segments.clone(),
            start_times: self.start_times.clone(),
            home: self.home,
            takeoff_time: self.takeoff_time,
            hint: AtomicUsize::new(self.hint.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Waypoint;

    fn approx_point(actual: Point, expected: Point) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}");
        }
    }

    fn linear() -> TrajectoryPlayer {
        let spec = TrajectorySpecification::new(
            1,
            vec![
                Waypoint::new(19.0, [-2.5, 10.0, 15.0]),
                Waypoint::new(19.5, [-2.5, 10.0, 15.0]),
                Waypoint::new(20.0, [-2.27, 10.17, 15.17]),
                Waypoint::new(20.5, [-1.34, 10.85, 15.85]),
                Waypoint::new(21.0, [0.02, 11.86, 16.86]),
                Waypoint::new(21.5, [1.41, 12.88, 17.88]),
                Waypoint::new(22.0, [2.79, 13.9, 18.9]),
            ],
            3.0,
        )
        .unwrap();
        TrajectoryPlayer::new(spec)
    }

    #[test]
    fn phases_of_linear_trajectory() {
        let player = linear();
        assert_eq!(player.start_time(), 22.0);
        assert_eq!(player.end_time(), 25.0);

        assert_eq!(player.phase_at(0.0), PlaybackPhase::BeforeTakeoff);
        assert_eq!(player.phase_at(3.0), PlaybackPhase::HoldingAtStart);
        assert_eq!(player.phase_at(22.0), PlaybackPhase::Moving { segment: 0 });
        assert_eq!(player.phase_at(22.6), PlaybackPhase::Moving { segment: 1 });
        assert_eq!(player.phase_at(24.9), PlaybackPhase::Moving { segment: 5 });
        assert_eq!(player.phase_at(25.0), PlaybackPhase::Ended);
        assert!(!player.has_ended_at(24.9));
        assert!(player.has_ended_at(30.0));
    }

    #[test]
    fn hint_never_changes_results() {
        let player = linear();
        let forward: Vec<_> = (0..300).map(|i| player.position_at(i as f64 * 0.1)).collect();
        let backward: Vec<_> = (0..300)
            .rev()
            .map(|i| player.position_at(i as f64 * 0.1))
            .collect();
        let fresh = linear();
        for (i, position) in forward.iter().enumerate() {
            assert_eq!(*position, backward[299 - i]);
            assert_eq!(*position, fresh.clone().position_at(i as f64 * 0.1));
        }
    }

    #[test]
    fn zero_length_segments_evaluate_to_their_start() {
        let spec = TrajectorySpecification::new(
            1,
            vec![
                Waypoint::new(0.0, [0.0, 0.0, 0.0]),
                Waypoint::new(1.0, [1.0, 0.0, 0.0]),
                Waypoint::new(1.0, [5.0, 0.0, 0.0]),
                Waypoint::new(2.0, [6.0, 0.0, 0.0]),
            ],
            0.0,
        )
        .unwrap();
        let player = TrajectoryPlayer::new(spec);
        approx_point(player.position_at(0.5), [0.5, 0.0, 0.0]);
        approx_point(player.position_at(1.0), [5.0, 0.0, 0.0]);
        approx_point(player.position_at(1.5), [5.5, 0.0, 0.0]);
    }

    #[test]
    fn explicit_home_is_used_before_takeoff() {
        let spec = TrajectorySpecification::new(1, vec![Waypoint::new(0.0, [1.0, 1.0, 5.0])], 10.0)
            .unwrap()
            .with_home([1.0, 1.0, 0.0]);
        let player = TrajectoryPlayer::new(spec);
        assert_eq!(player.position_at(5.0), [1.0, 1.0, 0.0]);
        assert_eq!(player.position_at(10.0), [1.0, 1.0, 5.0]);
        assert_eq!(player.position_at(100.0), [1.0, 1.0, 5.0]);
        assert_eq!(player.start_time(), 10.0);
        assert_eq!(player.end_time(), 10.0);
        assert_eq!(player.phase_at(10.0), PlaybackPhase::Ended);
    }

    #[test]
    fn nan_time_is_treated_as_before_takeoff() {
        let single = TrajectoryPlayer::new(
            TrajectorySpecification::new(1, vec![Waypoint::new(0.0, [1.0, 2.0, 3.0])], 0.0)
                .unwrap(),
        );
        assert!(single.is_before_takeoff(f64::NAN));
        assert_eq!(single.position_at(f64::NAN), [1.0, 2.0, 3.0]);
        assert_eq!(single.phase_at(f64::NAN), PlaybackPhase::BeforeTakeoff);
        assert!(!single.has_ended_at(f64::NAN));

        assert_eq!(single.position_at(f64::INFINITY), [1.0, 2.0, 3.0]);
        assert_eq!(single.position_at(f64::NEG_INFINITY), [1.0, 2.0, 3.0]);

        let player = linear();
        assert_eq!(player.position_at(f64::NAN), [-2.5, 10.0, 15.0]);
        assert_eq!(player.position_at(f64::INFINITY), [2.79, 13.9, 18.9]);
    }

    #[test]
    fn player_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TrajectoryPlayer>();
        assert_send_sync::<TrajectorySpecification>();

        let player = Arc::new(linear());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let player = Arc::clone(&player);
                std::thread::spawn(move || player.position_at(22.6))
            })
            .collect();
        for handle in handles {
            approx_point(handle.join().unwrap(), [-2.454, 10.034, 15.034]);
        }
    }
}
