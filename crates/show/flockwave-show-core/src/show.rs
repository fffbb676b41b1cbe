//! Per-drone show specifications as uploaded by ground control clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShowError;
use crate::rth::RthPlan;
use crate::trajectory::{Point, TrajectorySpecification};
use crate::yaw::YawSetpointList;

/// Largest accepted altitude reference, in meters above mean sea level.
const MAX_AMSL_REFERENCE: f64 = 10_000.0;

/// Mission-level information shared by every drone of a show.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionInfo {
    #[serde(rename = "numDrones", default, skip_serializing_if = "Option::is_none")]
    pub num_drones: Option<u64>,
}

/// The show specification of a single drone.
///
/// Only the parts this crate interprets are typed; the trajectory, the RTH
/// plan and the yaw control are kept as raw JSON and validated when they are
/// requested.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<Vec<f64>>,
    #[serde(rename = "amslReference", default, skip_serializing_if = "Option::is_none")]
    pub amsl_reference: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<Value>,
    #[serde(rename = "rthPlan", default, skip_serializing_if = "Option::is_none")]
    pub rth_plan: Option<Value>,
    #[serde(rename = "yawControl", default, skip_serializing_if = "Option::is_none")]
    pub yaw_control: Option<Value>,
}

impl ShowSpecification {
    pub fn from_json_str(json: &str) -> Result<Self, ShowError> {
        serde_json::from_str(json)
            .map_err(|e| ShowError::bad_format(format!("invalid show specification: {e}")))
    }

    /// The validated trajectory of the drone.
    pub fn trajectory(&self) -> Result<TrajectorySpecification, ShowError> {
        let value = self
            .trajectory
            .clone()
            .ok_or_else(|| ShowError::invalid_trajectory("show specification has no trajectory"))?;
        TrajectorySpecification::from_json_value(value)
    }

    /// The RTH plan of the drone, if the show has one.
    pub fn rth_plan(&self) -> Result<Option<RthPlan>, ShowError> {
        match &self.rth_plan {
            None | Some(Value::Null) => Ok(None),
            Some(value) => RthPlan::from_json_value(value.clone()).map(Some),
        }
    }

    /// The yaw setpoints of the drone, if the show controls yaw.
    pub fn yaw_setpoints(&self) -> Result<Option<YawSetpointList>, ShowError> {
        match &self.yaw_control {
            None | Some(Value::Null) => Ok(None),
            Some(value) => YawSetpointList::from_json_value(value.clone()).map(Some),
        }
    }

    /// Home position of the drone in meters, if it has exactly three
    /// coordinates.
    pub fn home_position(&self) -> Option<Point> {
        match self.home.as_deref() {
            Some(&[x, y, z]) => Some([x, y, z]),
            _ => None,
        }
    }

    /// Altitude above mean sea level that Z coordinates refer to; `None` when
    /// the show uses altitudes relative to home.
    pub fn altitude_reference(&self) -> Result<Option<f64>, ShowError> {
        match self.amsl_reference {
            Some(amsl) if !(-MAX_AMSL_REFERENCE..=MAX_AMSL_REFERENCE).contains(&amsl) => {
                Err(ShowError::out_of_range(format!(
                    "invalid altitude reference in show specification: {amsl}"
                )))
            }
            amsl => Ok(amsl),
        }
    }

    /// Zero-based index of the group of the drone; at most 256 groups are
    /// supported.
    pub fn group_index(&self) -> Result<u8, ShowError> {
        let group = self.group.unwrap_or(0);
        u8::try_from(group)
            .map_err(|_| ShowError::out_of_range(format!("group index outside valid range: {group}")))
    }

    /// Number of drones in the show, when the client sent it.
    pub fn drone_count(&self) -> Option<u64> {
        let mission: MissionInfo = serde_json::from_value(self.mission.clone()?).ok()?;
        mission.num_drones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn reads_show_fields() {
        let show = ShowSpecification::from_json_str(
            r#"{
                "home": [1, 2, 0],
                "amslReference": 120.5,
                "group": 3,
                "mission": {"numDrones": 50},
                "trajectory": {"version": 1, "points": [[0, [1, 2, 0], []]], "takeoffTime": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(show.home_position(), Some([1.0, 2.0, 0.0]));
        assert_eq!(show.altitude_reference().unwrap(), Some(120.5));
        assert_eq!(show.group_index().unwrap(), 3);
        assert_eq!(show.drone_count(), Some(50));
        assert_eq!(show.trajectory().unwrap().takeoff_time(), 5.0);
    }

    #[test]
    fn defaults_for_missing_fields() {
        let show = ShowSpecification::from_json_str("{}").unwrap();
        assert_eq!(show.home_position(), None);
        assert_eq!(show.altitude_reference().unwrap(), None);
        assert_eq!(show.group_index().unwrap(), 0);
        assert_eq!(show.drone_count(), None);
        assert_eq!(show.trajectory().unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(show.rth_plan().unwrap(), None);
        assert_eq!(show.yaw_setpoints().unwrap(), None);

        let show = ShowSpecification::from_json_str(r#"{"home": [1, 2], "mission": "x"}"#).unwrap();
        assert_eq!(show.home_position(), None);
        assert_eq!(show.drone_count(), None);
    }

    #[test]
    fn reads_optional_plans() {
        let show = ShowSpecification::from_json_str(
            r#"{
                "rthPlan": {"version": 1, "entries": [{"time": 0, "action": "land"}]},
                "yawControl": {"version": 1, "setpoints": [[0, 90], [10, 180]]}
            }"#,
        )
        .unwrap();
        assert_eq!(show.rth_plan().unwrap().map(|plan| plan.len()), Some(1));
        let yaw = show.yaw_setpoints().unwrap().unwrap();
        assert_eq!(yaw.yaw_offset(), 90.0);

        let show =
            ShowSpecification::from_json_str(r#"{"rthPlan": {"version": 2}, "yawControl": {}}"#)
                .unwrap();
        assert_eq!(show.rth_plan().unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(show.yaw_setpoints().unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let show = ShowSpecification::from_json_str(r#"{"amslReference": 10001}"#).unwrap();
        assert_eq!(show.altitude_reference().unwrap_err().kind(), ErrorKind::Range);

        let show = ShowSpecification::from_json_str(r#"{"amslReference": -10000}"#).unwrap();
        assert_eq!(show.altitude_reference().unwrap(), Some(-10000.0));

        for group in [-1, 256] {
            let show = ShowSpecification {
                group: Some(group),
                ..ShowSpecification::default()
            };
            assert_eq!(show.group_index().unwrap_err().kind(), ErrorKind::Range);
        }
    }
}
