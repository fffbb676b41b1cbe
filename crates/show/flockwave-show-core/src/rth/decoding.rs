//! Decoder for the payload of RTH plan blocks.
//!
//! See [`encoding`](super::encoding) for the layout.

use super::encoding::{ACTION_GO_TO, ACTION_LAND, ACTION_SAME, POST_DELAY_FLAG, PRE_DELAY_FLAG};
use super::{RthPlan, RthPlanEntry};
use crate::error::ShowError;
use crate::varint::decode_varint;

const RESERVED_BITS: u8 = 0b1100_1100;

struct Cursor<'a> {
    data: &'a [u8],
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ShowError> {
        let (head, rest) = self
            .data
            .split_first_chunk::<N>()
            .ok_or_else(|| ShowError::bad_format("truncated RTH plan block"))?;
        self.data = rest;
        Ok(*head)
    }

    fn varint(&mut self) -> Result<i64, ShowError> {
        let (value, used) = decode_varint(self.data)?;
        self.data = &self.data[used..];
        i64::try_from(value)
            .map_err(|_| ShowError::bad_format(format!("RTH plan value too large: {value}")))
    }
}

/// Decodes the payload of an RTH plan block. Targets come back in meters,
/// rounded to the resolution of the block.
pub fn decode_rth_plan(payload: &[u8]) -> Result<RthPlan, ShowError> {
    let mut cursor = Cursor { data: payload };

    let [scale] = cursor.take::<1>()?;
    if scale & 0x80 != 0 || scale == 0 {
        return Err(ShowError::bad_format(format!(
            "invalid scaling factor in RTH plan block: {scale}"
        )));
    }
    let scale = f64::from(scale);

    let count = u16::from_le_bytes(cursor.take()?);
    let points = (0..count)
        .map(|_| {
            let x = i16::from_le_bytes(cursor.take()?);
            let y = i16::from_le_bytes(cursor.take()?);
            Ok([f64::from(x) * scale / 1000.0, f64::from(y) * scale / 1000.0])
        })
        .collect::<Result<Vec<_>, ShowError>>()?;

    let count = u16::from_le_bytes(cursor.take()?);
    let mut plan = RthPlan::new();
    let mut previous: Option<RthPlanEntry> = None;
    for _ in 0..count {
        let [flags] = cursor.take::<1>()?;
        if flags & RESERVED_BITS != 0 {
            return Err(ShowError::bad_format(format!(
                "reserved bits set in RTH plan entry flags: {flags:#04x}"
            )));
        }
        let time = previous.as_ref().map_or(0, RthPlanEntry::time) + cursor.varint()?;

        let mut entry = match flags >> 4 {
            ACTION_SAME => match &previous {
                Some(previous) => previous.at_time(time),
                None => RthPlanEntry::land(time),
            },
            ACTION_LAND => RthPlanEntry::land(time),
            ACTION_GO_TO => {
                let index = cursor.varint()?;
                let target = usize::try_from(index)
                    .ok()
                    .and_then(|index| points.get(index))
                    .copied()
                    .ok_or_else(|| {
                        ShowError::bad_format(format!("RTH plan refers to missing point {index}"))
                    })?;
                RthPlanEntry::go_to(time, target, cursor.varint()?)
            }
            other => {
                return Err(ShowError::bad_format(format!(
                    "unknown action in RTH plan entry: {other}"
                )))
            }
        };
        if flags & PRE_DELAY_FLAG != 0 {
            entry = entry.with_pre_delay(cursor.varint()?);
        }
        if flags & POST_DELAY_FLAG != 0 {
            entry = entry.with_post_delay(cursor.varint()?);
        }

        plan.add_entry(entry.clone())
            .map_err(|e| ShowError::bad_format(format!("invalid RTH plan block: {e}")))?;
        previous = Some(entry);
    }

    if !cursor.data.is_empty() {
        return Err(ShowError::bad_format(format!(
            "{} trailing bytes after RTH plan",
            cursor.data.len()
        )));
    }
    Ok(plan)
}
