//! Trajectory specifications: versioned, immutable waypoint lists.
//!
//! A trajectory is stored as JSON of the form
//!
//! ```json
//! {
//!   "version": 1,
//!   "takeoffTime": 3,
//!   "points": [[0, [0, 0, 0], []], [6, [0, 3, 0], [[0, 0, 0], [-0.6, 2, 0]]]]
//! }
//! ```
//!
//! Waypoint times are relative to the takeoff time. The order of waypoints is
//! trusted; nothing is re-sorted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bbox::BoundingBox;
use crate::error::ShowError;

pub mod decoding;
pub mod encoding;
pub mod policy;
pub mod segment;

pub use policy::{DefaultGeometryPolicy, GeometryPolicy};
pub use segment::TrajectorySegment;

/// A point in the show coordinate system, in meters.
pub type Point = [f64; 3];

/// The only trajectory format version understood by this crate.
pub const TRAJECTORY_VERSION: u32 = 1;

/// A timestamped position, optionally with the control points of the curve
/// that leads to it from the previous waypoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "WaypointRepr", into = "WaypointRepr")]
pub struct Waypoint {
    pub time: f64,
    pub position: Point,
    pub control_points: Vec<Point>,
}

impl Waypoint {
    pub fn new(time: f64, position: Point) -> Self {
        Self {
            time,
            position,
            control_points: Vec::new(),
        }
    }

    pub fn with_control_points(mut self, control_points: impl Into<Vec<Point>>) -> Self {
        self.control_points = control_points.into();
        self
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WaypointRepr {
    Curved(f64, Point, Vec<Point>),
    Straight(f64, Point),
}

impl From<WaypointRepr> for Waypoint {
    fn from(repr: WaypointRepr) -> Self {
        match repr {
            WaypointRepr::Curved(time, position, control_points) => Self {
                time,
                position,
                control_points,
            },
            WaypointRepr::Straight(time, position) => Self::new(time, position),
        }
    }
}

impl From<Waypoint> for WaypointRepr {
    fn from(waypoint: Waypoint) -> Self {
        WaypointRepr::Curved(waypoint.time, waypoint.position, waypoint.control_points)
    }
}

/// JSON layout of a trajectory, before validation.
#[derive(Serialize, Deserialize)]
struct TrajectoryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<Value>,
    #[serde(default)]
    points: Vec<Waypoint>,
    #[serde(rename = "takeoffTime", default, skip_serializing_if = "Option::is_none")]
    takeoff_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    home: Option<Vec<f64>>,
    #[serde(rename = "landingHeight", default, skip_serializing_if = "Option::is_none")]
    landing_height: Option<f64>,
}

/// A validated trajectory of a single drone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectoryDocument", into = "TrajectoryDocument")]
pub struct TrajectorySpecification {
    version: u32,
    waypoints: Vec<Waypoint>,
    takeoff_time: f64,
    home: Option<Point>,
    landing_height: Option<f64>,
}

impl TryFrom<TrajectoryDocument> for TrajectorySpecification {
    type Error = ShowError;

    fn try_from(doc: TrajectoryDocument) -> Result<Self, Self::Error> {
        let version = match doc.version {
            None | Some(Value::Null) => {
                return Err(ShowError::invalid_trajectory(
                    "trajectory must have a version number",
                ))
            }
            Some(version) => version,
        };
        if version.as_f64() != Some(f64::from(TRAJECTORY_VERSION)) {
            return Err(ShowError::invalid_trajectory(format!(
                "only version {TRAJECTORY_VERSION} trajectories are supported, got {version}"
            )));
        }

        let home = match doc.home.as_deref() {
            None => None,
            Some(&[x, y, z]) => Some([x, y, z]),
            Some(other) => {
                return Err(ShowError::invalid_trajectory(format!(
                    "home position must have three coordinates, got {}",
                    other.len()
                )))
            }
        };

        Ok(Self {
            version: TRAJECTORY_VERSION,
            waypoints: doc.points,
            takeoff_time: doc.takeoff_time.unwrap_or(0.0),
            home,
            landing_height: doc.landing_height,
        })
    }
}

impl From<TrajectorySpecification> for TrajectoryDocument {
    fn from(spec: TrajectorySpecification) -> Self {
        Self {
            version: Some(Value::from(spec.version)),
            points: spec.waypoints,
            takeoff_time: Some(spec.takeoff_time),
            home: spec.home.map(Vec::from),
            landing_height: spec.landing_height,
        }
    }
}

impl TrajectorySpecification {
    /// Creates a trajectory from its parts.
    ///
    /// Fails with a format error unless `version` is 1.
    pub fn new(version: i64, waypoints: Vec<Waypoint>, takeoff_time: f64) -> Result<Self, ShowError> {
        if version != i64::from(TRAJECTORY_VERSION) {
            return Err(ShowError::invalid_trajectory(format!(
                "only version {TRAJECTORY_VERSION} trajectories are supported, got {version}"
            )));
        }
        Ok(Self {
            version: TRAJECTORY_VERSION,
            waypoints,
            takeoff_time,
            home: None,
            landing_height: None,
        })
    }

    /// Parses a trajectory from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self, ShowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Converts an already parsed JSON value into a trajectory.
    pub fn from_json_value(value: Value) -> Result<Self, ShowError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_value(&self) -> Result<Value, ShowError> {
        serde_json::to_value(self).map_err(|e| ShowError::invalid_trajectory(e.to_string()))
    }

    /// Sets an explicit home position.
    pub fn with_home(mut self, home: Point) -> Self {
        self.home = Some(home);
        self
    }

    /// Sets an explicit landing height.
    pub fn with_landing_height(mut self, height: f64) -> Self {
        self.landing_height = Some(height);
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Takeoff time in seconds; waypoint times are relative to it.
    #[inline]
    pub fn takeoff_time(&self) -> f64 {
        self.takeoff_time
    }

    /// Explicit home position, if the trajectory declares one.
    pub fn explicit_home(&self) -> Option<Point> {
        self.home
    }

    /// Ground position of the drone before the show, using the
    /// [`DefaultGeometryPolicy`].
    pub fn home_position(&self) -> Point {
        self.home_position_with(&DefaultGeometryPolicy)
    }

    /// Ground position of the drone before the show.
    pub fn home_position_with<P: GeometryPolicy + ?Sized>(&self, policy: &P) -> Point {
        if self.is_empty() && self.home.is_none() {
            return [0.0; 3];
        }
        policy.home_position(self)
    }

    /// Height of the last waypoint, unless the trajectory declares an
    /// explicit landing height.
    pub fn landing_height(&self) -> f64 {
        self.landing_height
            .or_else(|| self.waypoints.last().map(|w| w.position[2]))
            .unwrap_or(0.0)
    }

    /// Scaling factor to store the trajectory in a show file, using the
    /// [`DefaultGeometryPolicy`].
    pub fn propose_scaling_factor(&self) -> u32 {
        self.propose_scaling_factor_with(&DefaultGeometryPolicy)
    }

    pub fn propose_scaling_factor_with<P: GeometryPolicy + ?Sized>(&self, policy: &P) -> u32 {
        if self.is_empty() {
            return 1;
        }
        policy.scaling_factor(self)
    }

    /// Every waypoint and control point of the trajectory.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.waypoints.iter().flat_map(|w| {
            std::iter::once(w.position).chain(w.control_points.iter().copied())
        })
    }

    /// Opposite corners of the axis-aligned box around all waypoints and
    /// control points.
    pub fn bounding_box(&self) -> Result<(Point, Point), ShowError> {
        if self.is_empty() {
            return Err(ShowError::empty("the trajectory"));
        }
        self.points().collect::<BoundingBox<3>>().corners()
    }

    /// The bounding box grown by `margin` on every side.
    pub fn padded_bounding_box(&self, margin: f64) -> Result<(Point, Point), ShowError> {
        if self.is_empty() {
            return Err(ShowError::empty("the trajectory"));
        }
        self.points().collect::<BoundingBox<3>>().padded(margin)
    }

    /// The segments between consecutive waypoints, without validation.
    ///
    /// Segment times are relative to the takeoff time.
    pub fn segments(&self) -> impl Iterator<Item = TrajectorySegment> + '_ {
        self.waypoints
            .windows(2)
            .map(|pair| TrajectorySegment::between(&pair[0], &pair[1]))
    }

    /// The segments between consecutive waypoints.
    ///
    /// Fails if the first waypoint has control points or if time does not
    /// strictly increase from one waypoint to the next.
    pub fn checked_segments(&self) -> Result<Vec<TrajectorySegment>, ShowError> {
        let Some(first) = self.waypoints.first() else {
            return Ok(Vec::new());
        };
        if !first.control_points.is_empty() {
            return Err(ShowError::invalid_trajectory(
                "first keyframe must have no control points",
            ));
        }

        let mut segments = Vec::with_capacity(self.waypoints.len() - 1);
        for pair in self.waypoints.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let dt = next.time - prev.time;
            if dt < 0.0 {
                return Err(ShowError::invalid_trajectory(format!(
                    "time should not move backwards at t = {}",
                    next.time
                )));
            }
            if dt == 0.0 {
                return Err(ShowError::invalid_trajectory(format!(
                    "time should not stand still at t = {}",
                    next.time
                )));
            }
            segments.push(TrajectorySegment::between(prev, next));
        }
        Ok(segments)
    }
}
