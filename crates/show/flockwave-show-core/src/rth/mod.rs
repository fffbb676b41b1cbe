//! Return-to-home plans.
//!
//! A return-to-home (RTH) plan tells a drone what to do when it is asked to
//! return home at a given moment of the show: land where it is, or fly to a
//! target keeping its altitude and land there. Entries are keyed by whole
//! seconds since the start of the show.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::bbox::BoundingBox;
use crate::error::ShowError;
use crate::trajectory::policy::scaling_factor_for;

pub mod decoding;
pub mod encoding;

/// The only RTH plan version understood by this crate.
pub const RTH_PLAN_VERSION: u8 = 1;

/// What a drone does when asked to return home.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RthAction {
    #[serde(rename = "land")]
    Land,
    #[serde(rename = "goTo")]
    GoToKeepingAltitudeAndLand,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RthEntryDocument {
    #[serde(default)]
    time: Option<Number>,
    #[serde(default)]
    action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pre_delay: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_delay: Option<Value>,
}

/// A single entry of an RTH plan.
///
/// Only [`RthAction::GoToKeepingAltitudeAndLand`] entries carry a target,
/// a duration and delays; landing entries keep them at zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RthEntryDocument", into = "RthEntryDocument")]
pub struct RthPlanEntry {
    time: i64,
    action: RthAction,
    target: Option<[f64; 2]>,
    duration: i64,
    pre_delay: i64,
    post_delay: i64,
}

/// Accepts integers and floats without a fractional part.
fn integer(value: &Number, what: &str) -> Result<i64, ShowError> {
    if let Some(value) = value.as_i64() {
        return Ok(value);
    }
    match value.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => Ok(float as i64),
        _ => Err(ShowError::InvalidType {
            reason: format!("RTH plan entry {what} must be integers, got {value}"),
        }),
    }
}

/// Delays may be missing or `null`; anything else must be an integer.
fn delay(value: Option<&Value>, what: &str) -> Result<i64, ShowError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(number)) => integer(number, what),
        Some(other) => Err(ShowError::InvalidType {
            reason: format!("RTH plan entry {what} must be integers, got {other}"),
        }),
    }
}

impl TryFrom<RthEntryDocument> for RthPlanEntry {
    type Error = ShowError;

    fn try_from(doc: RthEntryDocument) -> Result<Self, Self::Error> {
        let time = doc
            .time
            .as_ref()
            .ok_or_else(|| ShowError::bad_format("RTH plan entries must have timestamps"))?;
        let time = integer(time, "timestamps")?;

        let action = doc
            .action
            .and_then(|action| serde_json::from_value::<RthAction>(action).ok())
            .ok_or_else(|| ShowError::bad_format("invalid action found in RTH plan entry"))?;

        if action == RthAction::Land {
            return Ok(Self::land(time));
        }

        let target = match doc.target.as_deref() {
            Some(&[x, y]) => [x, y],
            _ => {
                return Err(ShowError::bad_format(
                    "targets in RTH plan entry must be pairs of numbers",
                ))
            }
        };
        let duration = doc.duration.as_ref().ok_or_else(|| {
            ShowError::bad_format("RTH plan entries with targets must have durations")
        })?;
        let duration = integer(duration, "durations")?;

        Ok(Self::go_to(time, target, duration)
            .with_pre_delay(delay(doc.pre_delay.as_ref(), "pre-delays")?)
            .with_post_delay(delay(doc.post_delay.as_ref(), "post-delays")?))
    }
}

impl From<RthPlanEntry> for RthEntryDocument {
    fn from(entry: RthPlanEntry) -> Self {
        let go_to = entry.has_target();
        Self {
            time: Some(entry.time.into()),
            action: serde_json::to_value(entry.action).ok(),
            target: entry.target.filter(|_| go_to).map(Vec::from),
            duration: go_to.then(|| entry.duration.into()),
            pre_delay: (go_to && entry.has_pre_delay()).then(|| entry.pre_delay.into()),
            post_delay: (go_to && entry.has_post_delay()).then(|| entry.post_delay.into()),
        }
    }
}

impl RthPlanEntry {
    /// Land at the current position when RTH is requested at `time`.
    pub fn land(time: i64) -> Self {
        Self {
            time,
            action: RthAction::Land,
            target: None,
            duration: 0,
            pre_delay: 0,
            post_delay: 0,
        }
    }

    /// Fly to `target` in `duration` seconds keeping the altitude, then land.
    pub fn go_to(time: i64, target: [f64; 2], duration: i64) -> Self {
        Self {
            time,
            action: RthAction::GoToKeepingAltitudeAndLand,
            target: Some(target),
            duration,
            pre_delay: 0,
            post_delay: 0,
        }
    }

    /// Seconds to wait before starting the action. Non-positive values mean
    /// no delay.
    pub fn with_pre_delay(mut self, seconds: i64) -> Self {
        if self.has_target() {
            self.pre_delay = seconds.max(0);
        }
        self
    }

    /// Seconds to wait after the action, before landing. Non-positive
    /// values mean no delay.
    pub fn with_post_delay(mut self, seconds: i64) -> Self {
        if self.has_target() {
            self.post_delay = seconds.max(0);
        }
        self
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn action(&self) -> RthAction {
        self.action
    }

    /// Target of the action in meters; `None` for landing entries.
    pub fn target(&self) -> Option<[f64; 2]> {
        self.target
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn pre_delay(&self) -> i64 {
        self.pre_delay
    }

    pub fn post_delay(&self) -> i64 {
        self.post_delay
    }

    #[inline]
    pub fn has_target(&self) -> bool {
        self.action == RthAction::GoToKeepingAltitudeAndLand
    }

    #[inline]
    pub fn has_pre_delay(&self) -> bool {
        self.pre_delay > 0
    }

    #[inline]
    pub fn has_post_delay(&self) -> bool {
        self.post_delay > 0
    }

    /// Whether the two entries only differ in their timestamps.
    pub fn is_same_as_except_timestamp(&self, other: &Self) -> bool {
        Self {
            time: other.time,
            ..self.clone()
        } == *other
    }

    /// Copy of the entry at another timestamp.
    pub(crate) fn at_time(&self, time: i64) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RthPlanDocument {
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    entries: Option<Vec<RthPlanEntry>>,
}

/// The return-to-home plan of a single drone, ordered by strictly increasing
/// timestamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RthPlanDocument", into = "RthPlanDocument")]
pub struct RthPlan {
    entries: Vec<RthPlanEntry>,
}

impl TryFrom<RthPlanDocument> for RthPlan {
    type Error = ShowError;

    fn try_from(doc: RthPlanDocument) -> Result<Self, Self::Error> {
        let version = doc.version.as_ref().and_then(Value::as_f64);
        if version != Some(f64::from(RTH_PLAN_VERSION)) {
            return Err(ShowError::bad_format(format!(
                "only version {RTH_PLAN_VERSION} RTH plans are supported"
            )));
        }
        let entries = doc
            .entries
            .ok_or_else(|| ShowError::bad_format("entries not found in RTH plan"))?;

        let mut plan = Self::new();
        for entry in entries {
            plan.add_entry(entry)?;
        }
        Ok(plan)
    }
}

impl From<RthPlan> for RthPlanDocument {
    fn from(plan: RthPlan) -> Self {
        Self {
            version: Some(RTH_PLAN_VERSION.into()),
            entries: Some(plan.entries),
        }
    }
}

impl RthPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ShowError> {
        serde_json::from_str(json)
            .map_err(|e| ShowError::bad_format(format!("invalid RTH plan: {e}")))
    }

    pub fn from_json_value(value: Value) -> Result<Self, ShowError> {
        serde_json::from_value(value)
            .map_err(|e| ShowError::bad_format(format!("invalid RTH plan: {e}")))
    }

    pub fn to_json_value(&self) -> Result<Value, ShowError> {
        serde_json::to_value(self).map_err(|e| ShowError::bad_format(e.to_string()))
    }

    /// Appends an entry; its timestamp must be larger than that of the last
    /// entry.
    pub fn add_entry(&mut self, entry: RthPlanEntry) -> Result<(), ShowError> {
        if let Some(last) = self.last_timestamp() {
            if entry.time <= last {
                return Err(ShowError::out_of_range(format!(
                    "cannot add entry to RTH plan; timestamp must be larger than {last}, got {}",
                    entry.time
                )));
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[RthPlanEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RthPlanEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.entries.last().map(|entry| entry.time)
    }

    /// Every target point of the plan, in the order of the entries.
    pub fn targets(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.has_target())
            .filter_map(|entry| entry.target)
    }

    /// Corners of the box around all target points.
    pub fn bounding_box(&self) -> Result<([f64; 2], [f64; 2]), ShowError> {
        self.padded_bounding_box(0.0)
    }

    /// Corners of the box around all target points, grown by `margin`.
    pub fn padded_bounding_box(&self, margin: f64) -> Result<([f64; 2], [f64; 2]), ShowError> {
        let bbox: BoundingBox<2> = self.targets().collect();
        if bbox.is_empty() {
            return Err(ShowError::empty("the target list of the RTH plan"));
        }
        bbox.padded(margin)
    }

    /// Scaling factor to use when storing the plan in a show file; 1 when
    /// the plan has no targets.
    pub fn propose_scaling_factor(&self) -> u32 {
        match self.bounding_box() {
            Ok((min, max)) => scaling_factor_for(min.into_iter().chain(max)),
            Err(_) => 1,
        }
    }
}

impl<'a> IntoIterator for &'a RthPlan {
    type Item = &'a RthPlanEntry;
    type IntoIter = std::slice::Iter<'a, RthPlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
