//! Swappable derivation of trajectory properties that depend on geometry.

use super::{Point, TrajectorySpecification};

/// Number of non-negative values of a signed 16-bit coordinate.
const I16_RANGE: f64 = 32768.0;

/// Derives the home position and the show file scaling factor of a
/// non-empty trajectory.
///
/// [`TrajectorySpecification`] handles empty trajectories itself and only
/// consults the policy when there is at least one waypoint (or an explicit
/// home for [`home_position`](GeometryPolicy::home_position)).
pub trait GeometryPolicy: Send + Sync {
    fn home_position(&self, trajectory: &TrajectorySpecification) -> Point;

    fn scaling_factor(&self, trajectory: &TrajectorySpecification) -> u32;
}

/// Explicit home if given, else the first waypoint. The scaling factor is
/// the smallest one that lets every coordinate of the bounding box fit into
/// a signed 16-bit millimeter value after division.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultGeometryPolicy;

impl GeometryPolicy for DefaultGeometryPolicy {
    fn home_position(&self, trajectory: &TrajectorySpecification) -> Point {
        trajectory
            .explicit_home()
            .or_else(|| trajectory.waypoints().first().map(|w| w.position))
            .unwrap_or([0.0; 3])
    }

    fn scaling_factor(&self, trajectory: &TrajectorySpecification) -> u32 {
        let Ok((min, max)) = trajectory.bounding_box() else {
            return 1;
        };
        scaling_factor_for(min.into_iter().chain(max))
    }
}

/// Smallest scaling factor that fits every coordinate (in meters) into a
/// signed 16-bit millimeter value after division.
pub(crate) fn scaling_factor_for(coords: impl IntoIterator<Item = f64>) -> u32 {
    let extremum = coords.into_iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    let extremum = (extremum * 1000.0).ceil();
    // Saturates for absurdly large inputs; callers reject those.
    ((extremum + 1.0) / I16_RANGE).ceil() as u32
}
