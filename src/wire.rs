//! Wire constants shared by every dialect.
//!
//! The first byte of a packet is the discriminator:
//!
//!   0x01  tag/length dialect, legacy v1 (read-only)
//!   0x02  tag/length dialect, current v2
//!   0xEE  varint dialect
//!
//! Tag/length v2:
//!   version[1] || reserved[4]
//!   || [ TAG_ENCRYPTION_CONTEXT || ctx_len[4 BE] || ctx ]
//!   || TAG_SIZED_CIPHERTEXT || ct_len[4 BE] || ct
//!
//! Tag/length v1:
//!   version[1] || key_mask[4 BE]
//!   || [ TAG_EXPANDED_CONTEXT_DESCRIPTION || len[2 BE] || ctx     (mask != 0)
//!      | TAG_ENCRYPTION_CONTEXT           || len[2 BE] || ctx ]   (mask == 0)
//!   || TAG_CIPHERTEXT || ct (rest of stream)
//!
//! Varint:
//!   magic[1] || varint(aad_len) || aad || ct (rest of stream)

use sha2::{Digest, Sha256};

use crate::error::{EnvelopeError, Result};

/// Legacy tag/length version (decode only).
pub const VERSION_LEGACY: u8 = 0x01;

/// Current tag/length version.
pub const VERSION_CURRENT: u8 = 0x02;

/// Varint dialect discriminator (decimal 238).
pub const VARINT_MAGIC: u8 = 0xEE;

/// Reserved flags field written after the v2 version byte.
pub const RESERVED_BYTES: usize = 4;
pub const RESERVED_V2: [u8; RESERVED_BYTES] = [0; RESERVED_BYTES];

/// Width of v1's well-known key bitmask.
pub const LEGACY_MASK_BYTES: usize = 4;

// ---------------------------------------------------------------------------
// Entry tags
// ---------------------------------------------------------------------------

/// v1 only: explicit entries added on top of the bitmask keys.
pub const TAG_EXPANDED_CONTEXT_DESCRIPTION: u8 = 0x01;
/// Serialized encryption context section.
pub const TAG_ENCRYPTION_CONTEXT: u8 = 0x02;
/// v1 only: ciphertext runs to end of stream.
pub const TAG_CIPHERTEXT: u8 = 0x03;
/// v2: length-prefixed ciphertext.
pub const TAG_SIZED_CIPHERTEXT: u8 = 0x04;

/// Header of a v2 packet: version + reserved.
pub const V2_HEADER_BYTES: usize = 1 + RESERVED_BYTES;

/// Tag + 4-byte length.
pub const V2_SECTION_OVERHEAD: usize = 1 + 4;

/// Smallest valid v2 packet (no context, empty ciphertext).
pub const MIN_V2_PACKET_BYTES: usize = V2_HEADER_BYTES + V2_SECTION_OVERHEAD;

/// Wire dialect selected by the leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TagLengthV1,
    TagLengthV2,
    Varint,
}

impl Dialect {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            VERSION_LEGACY => Ok(Self::TagLengthV1),
            VERSION_CURRENT => Ok(Self::TagLengthV2),
            VARINT_MAGIC => Ok(Self::Varint),
            version => Err(EnvelopeError::UnsupportedVersion { version }),
        }
    }

    /// Dialect of a packet, from its first byte.
    pub fn detect(packet: &[u8]) -> Result<Self> {
        let first = packet
            .first()
            .ok_or(EnvelopeError::MalformedPacket("empty packet"))?;
        Self::from_byte(*first)
    }

    pub fn version_byte(self) -> u8 {
        match self {
            Self::TagLengthV1 => VERSION_LEGACY,
            Self::TagLengthV2 => VERSION_CURRENT,
            Self::Varint => VARINT_MAGIC,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TagLengthV1 => "tag-length v1 (legacy)",
            Self::TagLengthV2 => "tag-length v2",
            Self::Varint => "varint",
        }
    }
}

/// Short, log-safe identifier for context bytes: hex of the first 8 bytes
/// of their SHA-256.
pub fn context_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_do_not_overlap() {
        assert_ne!(VERSION_LEGACY, VARINT_MAGIC);
        assert_ne!(VERSION_CURRENT, VARINT_MAGIC);
        assert_eq!(VARINT_MAGIC, 238);
    }

    #[test]
    fn detect() {
        assert_eq!(Dialect::detect(&[0x02, 0, 0]).unwrap(), Dialect::TagLengthV2);
        assert_eq!(Dialect::detect(&[238]).unwrap(), Dialect::Varint);
        assert_eq!(
            Dialect::detect(&[0x07]),
            Err(EnvelopeError::UnsupportedVersion { version: 7 })
        );
        assert!(matches!(
            Dialect::detect(&[]),
            Err(EnvelopeError::MalformedPacket(_))
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = context_fingerprint(b"key=value");
        assert_eq!(a.len(), 16);
        assert_eq!(a, context_fingerprint(b"key=value"));
        assert_ne!(a, context_fingerprint(b"key=other"));
    }
}
