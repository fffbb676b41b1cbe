//! CRC32 flavour used by MAVLink FTP and by version 2 show files.
//!
//! Same reflected polynomial as the common CRC-32 but with an initial value
//! of zero and no final inversion.

use crc::{Algorithm, Crc, Digest};

/// Parameters of the MAVFTP CRC32 variant.
pub const CRC_32_MAVFTP: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04c1_1db7,
    init: 0,
    refin: true,
    refout: true,
    xorout: 0,
    check: 0x2dfd_2d88,
    residue: 0,
};

static MAVFTP: Crc<u32> = Crc::<u32>::new(&CRC_32_MAVFTP);

/// Width of the checksum field in the file header.
pub const CHECKSUM_LEN: usize = 4;

/// Computes the checksum of `data`.
pub fn crc32_mavftp(data: &[u8]) -> u32 {
    MAVFTP.checksum(data)
}

/// Starts an incremental checksum computation.
pub(crate) fn digest() -> Digest<'static, u32> {
    MAVFTP.digest()
}

/// Checksum of a complete file whose checksum field starts at `field_offset`;
/// the field itself counts as zeros.
pub(crate) fn file_checksum(data: &[u8], field_offset: usize) -> u32 {
    let field_end = (field_offset + CHECKSUM_LEN).min(data.len());
    let mut digest = digest();
    digest.update(&data[..field_offset.min(data.len())]);
    digest.update(&[0u8; CHECKSUM_LEN]);
    digest.update(&data[field_end..]);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_check_value() {
        assert_eq!(crc32_mavftp(b"123456789"), 0x2dfd_2d88);
    }

    #[test]
    fn matches_autopilot_reference() {
        let data: &[u8] = b"skyb\x02\x01\x00\x00\x00\x00\x01\x8d\x00\x01\x00\x00\x00\x00\x00\x00\
            \x00\x00 g\x04\x00\x00\xd5\x00\x80\x02\x10B\x1e\x90$ g\x04;&\x10'\
            \x10'\x02g\x04\x00\x00\xd5\x00\x80\x02\x01B\x1e\x90$\x02g\x04;&\x10'\
            \x10'\x08g\x04\x00\x00\xd5\x00\x80\x02\x04B\x1e\x90$\x08g\x04;&\x10'\
            \x10'\x00\xb8\x0b\n\xa9\x06\x10'\xb9%\n#\x10'\xb9%\n#\x05\xbe\x19\x06\
            \x04\x06\x04\n\xa9\x06W\x01\x00\x00\x00\x00W\x01\x00\x00\x00\x00 g\
            \x04\x10';&\x90$\x10B\x1e\x80\x02 g\x04\xd5\x00\x00\x00\x00\x00\
            \x02\x03\x00\x07\x00\x00";
        assert_eq!(
            crc32_mavftp(data),
            u32::from_le_bytes([0xab, 0x5c, 0x53, 0x8a])
        );
    }

    #[test]
    fn checksum_field_counts_as_zeros() {
        let mut data = b"skyb\x02\x01\x00\x00\x00\x00\x03\x01\x00x".to_vec();
        let expected = file_checksum(&data, 6);
        assert_eq!(expected, crc32_mavftp(&data));

        data[6..10].copy_from_slice(&expected.to_le_bytes());
        assert_eq!(file_checksum(&data, 6), expected);
    }
}
