//! Encoder for the payload of RTH plan blocks.
//!
//! Layout of a payload:
//!
//! ```text
//! [SCALE u8] [POINT_COUNT u16] [X i16, Y i16]* [ENTRY_COUNT u16] [ENTRY]*
//! ENTRY = [FLAGS u8] [TIME_DIFF varint] [POINT_INDEX varint, DURATION varint]?
//!         [PRE_DELAY varint]? [POST_DELAY varint]?
//! ```
//!
//! Fixed-size integers are little-endian; target points are millimeters
//! divided by the scale, stored once and referenced by index. `FLAGS` reads
//! `[__AA__pP]`: `AA` is the action (0 = same as the previous entry, 1 =
//! land, 2 = go to target), `p` and `P` flag a non-zero pre- and post-delay.
//! An action of 0 is followed by the time difference only.

use std::collections::hash_map::{Entry, HashMap};

use log::debug;

use super::{RthAction, RthPlan, RthPlanEntry};
use crate::config::ShowConfig;
use crate::error::ShowError;
use crate::varint::write_varint;

pub(crate) const ACTION_SAME: u8 = 0;
pub(crate) const ACTION_LAND: u8 = 1;
pub(crate) const ACTION_GO_TO: u8 = 2;
pub(crate) const PRE_DELAY_FLAG: u8 = 0b10;
pub(crate) const POST_DELAY_FLAG: u8 = 0b01;

/// Encodes RTH plans at a fixed scale.
#[derive(Clone, Copy, Debug)]
pub struct RthPlanEncoder {
    scale: u8,
    multiplier: f64,
}

impl RthPlanEncoder {
    /// Targets are multiplied by `1000 / scale` and truncated towards zero.
    pub fn new(scale: u32) -> Result<Self, ShowError> {
        let scale = u8::try_from(scale)
            .ok()
            .filter(|scale| (1..0x80).contains(scale))
            .ok_or_else(|| {
                ShowError::out_of_range(format!("RTH plan scaling factor must be 1-127, got {scale}"))
            })?;
        Ok(Self {
            scale,
            multiplier: 1000.0 / f64::from(scale),
        })
    }

    pub fn encode(&self, plan: &RthPlan) -> Result<Vec<u8>, ShowError> {
        let mut out = vec![self.scale];
        let point_index = self.encode_points(plan, &mut out)?;

        let count = u16::try_from(plan.len())
            .map_err(|_| ShowError::out_of_range("too many entries in RTH plan"))?;
        out.extend_from_slice(&count.to_le_bytes());

        let mut previous: Option<&RthPlanEntry> = None;
        for entry in plan {
            self.encode_entry(entry, previous, &point_index, &mut out)?;
            previous = Some(entry);
        }
        Ok(out)
    }

    /// Writes the de-duplicated target table and returns the index of every
    /// scaled target.
    fn encode_points(
        &self,
        plan: &RthPlan,
        out: &mut Vec<u8>,
    ) -> Result<HashMap<[i16; 2], u64>, ShowError> {
        let mut index = HashMap::new();
        let mut table = Vec::new();
        for target in plan.targets() {
            let point = self.scale_point(target)?;
            if let Entry::Vacant(slot) = index.entry(point) {
                slot.insert(table.len() as u64);
                table.push(point);
            }
        }

        let count = u16::try_from(table.len())
            .map_err(|_| ShowError::out_of_range("too many points in RTH plan"))?;
        out.extend_from_slice(&count.to_le_bytes());
        for [x, y] in table {
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
        Ok(index)
    }

    fn encode_entry(
        &self,
        entry: &RthPlanEntry,
        previous: Option<&RthPlanEntry>,
        point_index: &HashMap<[i16; 2], u64>,
        out: &mut Vec<u8>,
    ) -> Result<(), ShowError> {
        let diff = entry.time() - previous.map_or(0, RthPlanEntry::time);
        let diff = u64::try_from(diff)
            .map_err(|_| ShowError::out_of_range("timestamps in RTH plan must not go back in time"))?;

        let repeated = previous.is_some_and(|previous| entry.is_same_as_except_timestamp(previous));
        let action = match entry.action() {
            _ if repeated => ACTION_SAME,
            RthAction::Land => ACTION_LAND,
            RthAction::GoToKeepingAltitudeAndLand => ACTION_GO_TO,
        };
        let has_target = !repeated && entry.has_target();
        let has_pre_delay = !repeated && entry.has_pre_delay();
        let has_post_delay = !repeated && entry.has_post_delay();

        let mut flags = action << 4;
        if has_pre_delay {
            flags |= PRE_DELAY_FLAG;
        }
        if has_post_delay {
            flags |= POST_DELAY_FLAG;
        }
        out.push(flags);
        write_varint(out, diff);

        if has_target {
            let duration = u64::try_from(entry.duration()).map_err(|_| {
                ShowError::out_of_range(format!(
                    "RTH action has negative duration: {}",
                    entry.duration()
                ))
            })?;
            let target = entry
                .target()
                .ok_or_else(|| ShowError::bad_format("RTH plan entry has no target"))?;
            let index = point_index
                .get(&self.scale_point(target)?)
                .copied()
                .ok_or_else(|| ShowError::bad_format("RTH plan target missing from point table"))?;
            write_varint(out, index);
            write_varint(out, duration);
        }

        // Delays are positive whenever their flag is set.
        if has_pre_delay {
            write_varint(out, entry.pre_delay().unsigned_abs());
        }
        if has_post_delay {
            write_varint(out, entry.post_delay().unsigned_abs());
        }
        Ok(())
    }

    fn scale_point(&self, point: [f64; 2]) -> Result<[i16; 2], ShowError> {
        let mut out = [0i16; 2];
        for (slot, coord) in out.iter_mut().zip(point) {
            let scaled = (coord * self.multiplier).trunc();
            if !(f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&scaled) {
                return Err(ShowError::out_of_range(format!(
                    "RTH target coordinate {coord} does not fit into an RTH plan block at this scale"
                )));
            }
            *slot = scaled as i16;
        }
        Ok(out)
    }
}

/// Encodes a whole RTH plan into the payload of an RTH plan block, choosing
/// the scale from the extent of its targets.
pub fn encode_rth_plan(plan: &RthPlan, config: &ShowConfig) -> Result<Vec<u8>, ShowError> {
    let scale = plan.propose_scaling_factor();
    if scale > config.max_scaling_factor || scale > 127 {
        return Err(ShowError::out_of_range(
            "RTH plan covers too large an area for a Skybrush binary show file",
        ));
    }

    let out = RthPlanEncoder::new(scale)?.encode(plan)?;
    debug!(
        "encoded RTH plan with {} entries at scale {scale} into {} bytes",
        plan.len(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::rth::tests::plan;

    #[test]
    fn encodes_reference_plan() {
        let payload = encode_rth_plan(&plan(), &ShowConfig::default()).unwrap();
        assert_eq!(
            payload,
            b"\x02\
              \x02\x00\x10\x27\x10\x27\x54\xf2\x5c\x44\
              \x04\x00\
              \x10\x00\
              \x20\x05\x00\x0a\
              \x20\x14\x01\x0f\
              \x10\x0f"
        );
    }

    #[test]
    fn repeated_entries_store_only_the_time_difference() {
        let mut plan = RthPlan::new();
        plan.add_entry(RthPlanEntry::go_to(10, [1.0, 2.0], 5)).unwrap();
        plan.add_entry(RthPlanEntry::go_to(310, [1.0, 2.0], 5)).unwrap();
        plan.add_entry(RthPlanEntry::go_to(320, [1.0, 2.0], 6)).unwrap();

        let payload = RthPlanEncoder::new(1).unwrap().encode(&plan).unwrap();
        assert_eq!(
            payload,
            b"\x01\
              \x01\x00\xe8\x03\xd0\x07\
              \x03\x00\
              \x20\x0a\x00\x05\
              \x00\xac\x02\
              \x20\x0a\x00\x06"
        );
    }

    #[test]
    fn delays_follow_the_target() {
        let mut plan = RthPlan::new();
        plan.add_entry(
            RthPlanEntry::go_to(0, [0.0, 0.0], 4)
                .with_pre_delay(3)
                .with_post_delay(200),
        )
        .unwrap();
        plan.add_entry(RthPlanEntry::go_to(1, [0.0, 0.0], 4).with_post_delay(1))
            .unwrap();

        let payload = RthPlanEncoder::new(1).unwrap().encode(&plan).unwrap();
        assert_eq!(
            payload,
            b"\x01\x01\x00\x00\x00\x00\x00\x02\x00\
              \x23\x00\x00\x04\x03\xc8\x01\
              \x21\x01\x00\x04\x01"
        );
    }

    #[test]
    fn targets_are_truncated_and_shared() {
        let mut plan = RthPlan::new();
        plan.add_entry(RthPlanEntry::go_to(0, [0.0019, -0.0019], 1)).unwrap();
        plan.add_entry(RthPlanEntry::go_to(1, [0.001, -0.001], 2)).unwrap();

        let payload = RthPlanEncoder::new(1).unwrap().encode(&plan).unwrap();
        // Both targets truncate to (1, -1) mm and share one table slot.
        assert_eq!(&payload[..7], b"\x01\x01\x00\x01\x00\xff\xff");
        assert_eq!(&payload[7..], b"\x02\x00\x20\x00\x00\x01\x20\x01\x00\x02");
    }

    #[test]
    fn empty_plan_has_empty_tables() {
        let payload = encode_rth_plan(&RthPlan::new(), &ShowConfig::default()).unwrap();
        assert_eq!(payload, b"\x01\x00\x00\x00\x00");
    }

    #[test]
    fn rejects_unencodable_plans() {
        let mut backwards = RthPlan::new();
        backwards.add_entry(RthPlanEntry::land(-5)).unwrap();
        let err = encode_rth_plan(&backwards, &ShowConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().contains("back in time"));

        let mut negative = RthPlan::new();
        negative.add_entry(RthPlanEntry::go_to(0, [1.0, 1.0], -1)).unwrap();
        let err = encode_rth_plan(&negative, &ShowConfig::default()).unwrap_err();
        assert!(err.to_string().contains("negative duration"));

        let mut huge = RthPlan::new();
        huge.add_entry(RthPlanEntry::go_to(0, [5000.0, 0.0], 1)).unwrap();
        let err = encode_rth_plan(&huge, &ShowConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().contains("too large an area"));

        assert!(RthPlanEncoder::new(0).is_err());
        assert!(RthPlanEncoder::new(128).is_err());
        let err = RthPlanEncoder::new(1).unwrap().encode(&plan()).unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }
}
