//! Yaw setpoints of a single drone.
//!
//! Yaw is either scripted as a list of `(time, yaw)` setpoints with linear
//! interpolation in between, or left to the drone ("auto yaw"), which then
//! faces its direction of travel shifted by a fixed offset.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShowError;

pub mod decoding;
pub mod encoding;

/// The only yaw control version understood by this crate.
pub const YAW_CONTROL_VERSION: u8 = 1;

/// Yaw (degrees) to reach at a time (seconds).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct YawSetpoint {
    pub time: f64,
    pub yaw: f64,
}

impl YawSetpoint {
    pub fn new(time: f64, yaw: f64) -> Self {
        Self { time, yaw }
    }
}

impl From<(f64, f64)> for YawSetpoint {
    fn from((time, yaw): (f64, f64)) -> Self {
        Self { time, yaw }
    }
}

impl From<YawSetpoint> for (f64, f64) {
    fn from(setpoint: YawSetpoint) -> Self {
        (setpoint.time, setpoint.yaw)
    }
}

/// Yaw change (degrees) over a duration (seconds).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeYawSetpoint {
    pub duration: f64,
    pub yaw_change: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YawControlDocument {
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    auto_yaw: Option<Value>,
    #[serde(default)]
    auto_yaw_offset: Option<f64>,
    #[serde(default)]
    setpoints: Vec<YawSetpoint>,
}

/// Yaw setpoints ordered by time, or auto yaw with an offset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "YawControlDocument", into = "YawControlDocument")]
pub struct YawSetpointList {
    setpoints: Vec<YawSetpoint>,
    auto_yaw: bool,
    auto_yaw_offset: f64,
}

impl TryFrom<YawControlDocument> for YawSetpointList {
    type Error = ShowError;

    fn try_from(doc: YawControlDocument) -> Result<Self, Self::Error> {
        let version = doc
            .version
            .ok_or_else(|| ShowError::bad_format("yaw control must have a version number"))?;
        if version.as_f64() != Some(f64::from(YAW_CONTROL_VERSION)) {
            return Err(ShowError::bad_format(format!(
                "only version {YAW_CONTROL_VERSION} of yaw control is supported, got {version}"
            )));
        }

        let auto_yaw = match doc.auto_yaw {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|x| x != 0.0),
            Some(other) => {
                return Err(ShowError::InvalidType {
                    reason: format!("yaw control's auto yaw value must be a boolean, got {other}"),
                })
            }
        };

        Self::new(doc.setpoints, auto_yaw, doc.auto_yaw_offset.unwrap_or(0.0))
    }
}

impl From<YawSetpointList> for YawControlDocument {
    fn from(list: YawSetpointList) -> Self {
        Self {
            version: Some(YAW_CONTROL_VERSION.into()),
            auto_yaw: Some(list.auto_yaw.into()),
            auto_yaw_offset: Some(list.auto_yaw_offset),
            setpoints: list.setpoints,
        }
    }
}

impl YawSetpointList {
    /// Creates a list; setpoints are sorted by time. Auto yaw excludes
    /// setpoints.
    pub fn new(
        setpoints: impl IntoIterator<Item = YawSetpoint>,
        auto_yaw: bool,
        auto_yaw_offset: f64,
    ) -> Result<Self, ShowError> {
        let mut setpoints: Vec<_> = setpoints.into_iter().collect();
        if auto_yaw && !setpoints.is_empty() {
            return Err(ShowError::bad_format(
                "setpoints cannot be used with auto yaw in yaw control block",
            ));
        }
        setpoints.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self {
            setpoints,
            auto_yaw,
            auto_yaw_offset,
        })
    }

    /// Auto yaw facing the direction of travel plus `offset` degrees.
    pub fn auto(offset: f64) -> Self {
        Self {
            setpoints: Vec::new(),
            auto_yaw: true,
            auto_yaw_offset: offset,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ShowError> {
        serde_json::from_str(json)
            .map_err(|e| ShowError::bad_format(format!("invalid yaw control: {e}")))
    }

    pub fn from_json_value(value: Value) -> Result<Self, ShowError> {
        serde_json::from_value(value)
            .map_err(|e| ShowError::bad_format(format!("invalid yaw control: {e}")))
    }

    pub fn to_json_value(&self) -> Result<Value, ShowError> {
        serde_json::to_value(self).map_err(|e| ShowError::bad_format(e.to_string()))
    }

    pub fn setpoints(&self) -> &[YawSetpoint] {
        &self.setpoints
    }

    pub fn auto_yaw(&self) -> bool {
        self.auto_yaw
    }

    pub fn auto_yaw_offset(&self) -> f64 {
        self.auto_yaw_offset
    }

    /// Starting yaw: the auto yaw offset, else the yaw of the first setpoint,
    /// else zero.
    pub fn yaw_offset(&self) -> f64 {
        if self.auto_yaw {
            return self.auto_yaw_offset;
        }
        self.setpoints.first().map_or(0.0, |setpoint| setpoint.yaw)
    }

    /// The setpoints as consecutive changes starting from
    /// [`yaw_offset`](Self::yaw_offset) at time zero (or at the first
    /// setpoint when that is earlier).
    ///
    /// Steps longer than `max_duration` seconds or turning more than
    /// `max_yaw_change` degrees are cut into equal pieces that respect both
    /// limits.
    pub fn relative_setpoints(
        &self,
        max_duration: f64,
        max_yaw_change: f64,
    ) -> impl Iterator<Item = RelativeYawSetpoint> + '_ {
        let mut last_time = self.setpoints.first().map_or(0.0, |first| first.time.min(0.0));
        let mut last_yaw = self.yaw_offset();

        self.setpoints.iter().flat_map(move |setpoint| {
            let duration = setpoint.time - last_time;
            let yaw_change = setpoint.yaw - last_yaw;
            last_time = setpoint.time;
            last_yaw = setpoint.yaw;

            let splits = ((duration / max_duration).ceil() - 1.0)
                .max((yaw_change.abs() / max_yaw_change).ceil() - 1.0)
                .max(0.0);
            let pieces = splits as usize + 1;
            let ratio = 1.0 / pieces as f64;
            std::iter::repeat(RelativeYawSetpoint {
                duration: duration * ratio,
                yaw_change: yaw_change * ratio,
            })
            .take(pieces)
        })
    }
}
