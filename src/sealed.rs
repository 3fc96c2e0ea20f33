//! Packet envelope, varint dialect.
//!
//! Format:
//!   magic[1] || varint(aad_len) || aad || ciphertext (rest of stream)
//!
//! A zero AAD length means no context was bound. Ciphertext length is not
//! validated here; that is the encryption provider's concern.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::aad::{serialize_context, serialize_context_with_limits, Limits};
use crate::error::{EnvelopeError, Result};
use crate::reader::Reader;
use crate::varint::{encode_varint, varint_len};
use crate::wire::{context_fingerprint, VARINT_MAGIC};

/// Borrowed view of a varint-dialect packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedParts<'a> {
    pub ciphertext: &'a [u8],
    pub aad: Option<&'a [u8]>,
}

/// Frame `ciphertext` with optional AAD bytes.
///
/// An empty `aad` is written exactly like `None`.
pub fn serialize(ciphertext: &[u8], aad: Option<&[u8]>) -> Vec<u8> {
    let aad = aad.unwrap_or_default();
    let mut out =
        Vec::with_capacity(1 + varint_len(aad.len() as u64) + aad.len() + ciphertext.len());
    out.push(VARINT_MAGIC);
    encode_varint(aad.len() as u64, &mut out);
    out.extend_from_slice(aad);
    out.extend_from_slice(ciphertext);
    out
}

/// Canonicalize `context` and frame it with `ciphertext`.
pub fn serialize_with_context<I, K, V>(ciphertext: &[u8], context: Option<I>) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let aad = serialize_context(context)?;
    Ok(serialize(ciphertext, aad.as_deref()))
}

/// Parse and verify against `expected`, which is canonicalized the same way
/// the writer canonicalized its context.
///
/// Absence must match absence; presence must match byte for byte.
pub fn deserialize<'a, I, K, V>(bytes: &'a [u8], expected: Option<I>) -> Result<SealedParts<'a>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    deserialize_with_limits(bytes, expected, &Limits::default())
}

/// [`deserialize`] for contexts written under non-default [`Limits`].
///
/// An expectation that cannot be canonicalized under `limits` is a
/// `ContextMismatch`.
pub fn deserialize_with_limits<'a, I, K, V>(
    bytes: &'a [u8],
    expected: Option<I>,
    limits: &Limits,
) -> Result<SealedParts<'a>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let parts = parse(bytes).map_err(|e| {
        debug!(
            error = %e,
            version = ?bytes.first(),
            len = bytes.len(),
            "varint packet rejected"
        );
        e
    })?;
    let expected = serialize_context_with_limits(expected, limits).map_err(|e| {
        debug!(error = %e, "expected context cannot be canonicalized");
        EnvelopeError::ContextMismatch
    })?;

    let matches = match (parts.aad, expected.as_deref()) {
        (None, None) => true,
        (Some(ours), Some(theirs)) => bool::from(ours.ct_eq(theirs)),
        _ => false,
    };
    if !matches {
        warn!(
            dialect = "varint",
            packet_context = parts.aad.map(context_fingerprint).as_deref().unwrap_or("none"),
            expected_present = expected.is_some(),
            "encryption context verification failed"
        );
        return Err(EnvelopeError::ContextMismatch);
    }

    Ok(parts)
}

/// Structure only, no context check.
pub(crate) fn parse(bytes: &[u8]) -> Result<SealedParts<'_>> {
    let mut r = Reader::new(bytes);
    let version = r.u8("missing version byte")?;
    if version != VARINT_MAGIC {
        return Err(EnvelopeError::UnsupportedVersion { version });
    }
    let aad = r.varint_prefixed("aad exceeds packet")?;
    let aad = if aad.is_empty() { None } else { Some(aad) };
    Ok(SealedParts {
        ciphertext: r.rest(),
        aad,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CONTEXT: Option<[(&str, &str); 0]> = None;

    #[test]
    fn layout_without_aad() {
        assert_eq!(serialize(b"ct", None), [0xEE, 0x00, b'c', b't']);
        assert_eq!(serialize(b"ct", Some(&b""[..])), serialize(b"ct", None));
    }

    #[test]
    fn layout_with_aad() {
        assert_eq!(serialize(b"ct", Some(&b"ab"[..])), [0xEE, 0x02, b'a', b'b', b'c', b't']);
    }

    #[test]
    fn empty_ciphertext_is_valid() {
        let bytes = serialize(b"", None);
        let parts = deserialize(&bytes, NO_CONTEXT).unwrap();
        assert!(parts.ciphertext.is_empty());
        assert!(parts.aad.is_none());
    }

    #[test]
    fn wrong_magic() {
        assert_eq!(
            deserialize(&[0x02, 0x00], NO_CONTEXT).unwrap_err(),
            EnvelopeError::UnsupportedVersion { version: 2 }
        );
    }

    #[test]
    fn unusable_expectation_is_a_mismatch() {
        let bytes = serialize_with_context(b"ct", Some([("key", "value")])).unwrap();
        for expected in [[("key", "")], [("", "value")], [("-_", "value")]] {
            assert_eq!(
                deserialize(&bytes, Some(expected)).unwrap_err(),
                EnvelopeError::ContextMismatch
            );
        }
    }

    #[test]
    fn aad_length_past_end() {
        assert!(matches!(
            deserialize(&[0xEE, 0x05, b'a'], NO_CONTEXT).unwrap_err(),
            EnvelopeError::MalformedPacket(_)
        ));
    }
}
