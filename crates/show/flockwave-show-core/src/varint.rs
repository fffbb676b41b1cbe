//! Variable-length encoding of non-negative integers.
//!
//! Values are stored in groups of 7 bits, least significant group first. Every
//! byte except the last one has its MSB set to signal that more bytes follow.

use std::io::Read;

use crate::error::ShowError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Longest encoding of a `u64` (ten groups of seven bits).
pub const MAX_VARINT_LEN: usize = 10;

/// Appends the variable-length encoding of `value` to `out`.
#[inline]
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= u64::from(CONTINUATION) {
        out.push((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Encodes `value` into a freshly allocated buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    write_varint(&mut out, value);
    out
}

/// Encodes a signed integer; negative values are a range error.
pub fn encode_signed(value: i64) -> Result<Vec<u8>, ShowError> {
    if value < 0 {
        return Err(ShowError::out_of_range(
            "cannot encode negative integers as variable length",
        ));
    }
    Ok(encode_varint(value as u64))
}

/// Encodes an untyped number.
///
/// The sign is checked before integrality, so `-4.5` is a range error while
/// `1.5` is a type error.
pub fn encode_number(value: f64) -> Result<Vec<u8>, ShowError> {
    if value < 0.0 {
        return Err(ShowError::out_of_range(
            "cannot encode negative integers as variable length",
        ));
    }
    if !value.is_finite() || value.fract() != 0.0 || value >= u64::MAX as f64 {
        return Err(ShowError::InvalidType {
            reason: format!("expected a non-negative integer, got {value}"),
        });
    }
    Ok(encode_varint(value as u64))
}

/// Decodes a value from the start of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), ShowError> {
    let mut value: u64 = 0;
    for (index, byte) in data.iter().enumerate() {
        value = accumulate(value, index, *byte)?;
        if byte & CONTINUATION == 0 {
            return Ok((value, index + 1));
        }
    }
    Err(ShowError::bad_format("truncated variable-length integer"))
}

/// Reads a single value from a byte stream.
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64, ShowError> {
    let mut value: u64 = 0;
    let mut buf = [0u8; 1];
    for index in 0.. {
        reader.read_exact(&mut buf)?;
        value = accumulate(value, index, buf[0])?;
        if buf[0] & CONTINUATION == 0 {
            break;
        }
    }
    Ok(value)
}

#[inline]
fn accumulate(value: u64, index: usize, byte: u8) -> Result<u64, ShowError> {
    let shift = 7 * index;
    let group = u64::from(byte & PAYLOAD_MASK);
    if index >= MAX_VARINT_LEN || (shift == 63 && group > 1) {
        return Err(ShowError::bad_format(
            "variable-length integer does not fit into 64 bits",
        ));
    }
    Ok(value | (group << shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn encodes_reference_values() {
        assert_eq!(encode_varint(0), b"\x00");
        assert_eq!(encode_varint(17), b"\x11");
        assert_eq!(encode_varint(127), b"\x7f");
        assert_eq!(encode_varint(128), b"\x80\x01");
        assert_eq!(encode_varint(255), b"\xff\x01");
        assert_eq!(encode_varint(42315), b"\xcb\xca\x02");
    }

    #[test]
    fn validation_checks_sign_before_type() {
        assert_eq!(encode_signed(-4).unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(encode_number(-4.0).unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(encode_number(1.5).unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(encode_number(-4.5).unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(encode_number(f64::NAN).unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(encode_number(42315.0).unwrap(), b"\xcb\xca\x02");
    }

    #[test]
    fn decodes_what_was_encoded() {
        for value in [0, 1, 127, 128, 255, 300, 42315, 1 << 35, u64::MAX] {
            let encoded = encode_varint(value);
            assert_eq!(decode_varint(&encoded).unwrap(), (value, encoded.len()));
            assert_eq!(read_varint(&mut encoded.as_slice()).unwrap(), value);
        }
    }

    #[test]
    fn decode_stops_at_first_terminal_byte() {
        let (value, used) = decode_varint(b"\x80\x01\x05").unwrap();
        assert_eq!((value, used), (128, 2));
    }

    #[test]
    fn truncated_input_is_a_format_error() {
        assert_eq!(
            decode_varint(b"\xcb\xca").unwrap_err().kind(),
            ErrorKind::Format
        );
        assert_eq!(
            read_varint(&mut &b"\x80"[..]).unwrap_err().kind(),
            ErrorKind::Format
        );
    }

    #[test]
    fn overlong_input_is_a_format_error() {
        let data = [0xffu8; 11];
        assert_eq!(decode_varint(&data).unwrap_err().kind(), ErrorKind::Format);
    }
}
