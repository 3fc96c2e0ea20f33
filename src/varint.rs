//! LEB128 unsigned variable-length integers.
//!
//! Little-endian base-128: 7 payload bits per byte, high bit set on every
//! byte except the last. Zero encodes as a single `0x00`.

use crate::error::{EnvelopeError, Result};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_BYTES: usize = 10;

/// Encode `value` as LEB128 into `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Number of bytes `encode_varint` writes for `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Decode a LEB128 `u64` from `buf` starting at `*pos`, advancing `*pos`.
///
/// Stops at the first byte with the high bit clear.
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let start = *pos;
    loop {
        let Some(&byte) = buf.get(*pos) else {
            return Err(EnvelopeError::MalformedPacket("truncated varint"));
        };
        *pos += 1;

        let payload = (byte & 0x7F) as u64;
        if shift >= 63 && payload > 1 {
            return Err(EnvelopeError::MalformedPacket("varint overflow"));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if *pos - start >= MAX_VARINT_BYTES {
            return Err(EnvelopeError::MalformedPacket("varint overflow"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(val: u64) {
        let mut buf = Vec::new();
        encode_varint(val, &mut buf);
        assert_eq!(buf.len(), varint_len(val));
        let mut pos = 0;
        assert_eq!(decode_varint(&buf, &mut pos).unwrap(), val);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn zero_is_single_byte() {
        let mut buf = Vec::new();
        encode_varint(0, &mut buf);
        assert_eq!(buf, [0x00]);
    }

    #[test]
    fn boundaries() {
        let mut buf = Vec::new();
        encode_varint(127, &mut buf);
        assert_eq!(buf, [0x7F]);
        buf.clear();
        encode_varint(128, &mut buf);
        assert_eq!(buf, [0x80, 0x01]);
        buf.clear();
        encode_varint(300, &mut buf);
        assert_eq!(buf, [0xAC, 0x02]);
    }

    #[test]
    fn various() {
        for val in [1, 255, 256, 65535, 65536, u32::MAX as u64, u64::MAX] {
            round_trip(val);
        }
        assert_eq!(varint_len(u64::MAX), MAX_VARINT_BYTES);
    }

    #[test]
    fn stops_at_first_terminal_byte() {
        let buf = [0x05, 0x80, 0x01];
        let mut pos = 0;
        assert_eq!(decode_varint(&buf, &mut pos).unwrap(), 5);
        assert_eq!(pos, 1);
        assert_eq!(decode_varint(&buf, &mut pos).unwrap(), 128);
    }

    #[test]
    fn longest_encoding_is_bounded() {
        let mut max = vec![0xFF; MAX_VARINT_BYTES - 1];
        max.push(0x01);
        let mut pos = 0;
        assert_eq!(decode_varint(&max, &mut pos).unwrap(), u64::MAX);

        // continuation past the tenth byte, even with a zero payload
        let mut too_long = vec![0x80; MAX_VARINT_BYTES - 1];
        too_long.extend_from_slice(&[0x81, 0x00]);
        let mut pos = 0;
        assert!(decode_varint(&too_long, &mut pos).is_err());
        assert_eq!(pos, MAX_VARINT_BYTES);
    }

    #[test]
    fn truncated_and_overflow() {
        let mut pos = 0;
        assert!(decode_varint(&[], &mut pos).is_err());
        let mut pos = 0;
        assert!(decode_varint(&[0x80, 0x80], &mut pos).is_err());
        let mut pos = 0;
        let too_long = [0xFF; 11];
        assert!(decode_varint(&too_long, &mut pos).is_err());
        let mut pos = 0;
        let overflow = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        assert!(decode_varint(&overflow, &mut pos).is_err());
    }
}
