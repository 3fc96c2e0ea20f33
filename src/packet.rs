//! Packet envelope, tag/length dialect (versions 1 and 2).
//!
//! Encoding always writes the current version. Version 1 is decoded for
//! backward compatibility only. See [`crate::wire`] for the byte layouts.

use tracing::{debug, warn};

use crate::context::{verify_context, EncryptionContext};
use crate::error::{EnvelopeError, Result};
use crate::reader::Reader;
use crate::well_known::{keys_from_mask, WellKnownKey};
use crate::wire::{
    context_fingerprint, Dialect, LEGACY_MASK_BYTES, RESERVED_BYTES, RESERVED_V2,
    TAG_CIPHERTEXT, TAG_ENCRYPTION_CONTEXT, TAG_EXPANDED_CONTEXT_DESCRIPTION,
    TAG_SIZED_CIPHERTEXT, V2_HEADER_BYTES, V2_SECTION_OVERHEAD, VERSION_CURRENT,
};

/// An optional encryption context plus the ciphertext it was bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    context: Option<EncryptionContext>,
    ciphertext: Vec<u8>,
}

/// A packet that has declared its context but has no ciphertext yet.
#[derive(Clone, Debug, Default)]
pub struct PacketBuilder {
    context: Option<EncryptionContext>,
}

impl PacketBuilder {
    pub fn context(mut self, context: EncryptionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Canonical AAD for the provider to encrypt under, before any
    /// ciphertext exists.
    pub fn aad(&self, additional: Option<&EncryptionContext>) -> Result<Option<Vec<u8>>> {
        aad_for(self.context.as_ref(), additional)
    }

    pub fn ciphertext(self, ciphertext: impl Into<Vec<u8>>) -> Packet {
        Packet {
            context: self.context,
            ciphertext: ciphertext.into(),
        }
    }
}

impl Packet {
    pub fn new(context: Option<EncryptionContext>, ciphertext: impl Into<Vec<u8>>) -> Self {
        Self {
            context,
            ciphertext: ciphertext.into(),
        }
    }

    pub fn builder() -> PacketBuilder {
        PacketBuilder::default()
    }

    pub fn context(&self) -> Option<&EncryptionContext> {
        self.context.as_ref()
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn into_parts(self) -> (Option<EncryptionContext>, Vec<u8>) {
        (self.context, self.ciphertext)
    }

    /// Canonical AAD bytes to hand to the encryption provider.
    ///
    /// Placeholder entries (absent values, e.g. from a v1 bitmask) must be
    /// filled from `additional`.
    pub fn aad(&self, additional: Option<&EncryptionContext>) -> Result<Option<Vec<u8>>> {
        aad_for(self.context.as_ref(), additional)
    }

    /// Encode in the current version.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.context.as_ref(), &self.ciphertext)
    }

    /// Decode and verify the embedded context against `expected`.
    pub fn decode(bytes: &[u8], expected: Option<&EncryptionContext>) -> Result<Self> {
        let (context, ciphertext) = decode(bytes, expected)?;
        Ok(Self {
            context,
            ciphertext,
        })
    }
}

fn aad_for(
    context: Option<&EncryptionContext>,
    additional: Option<&EncryptionContext>,
) -> Result<Option<Vec<u8>>> {
    let Some(context) = context else {
        return Ok(None);
    };
    let empty = EncryptionContext::new();
    let canonical = context.serialize_with(additional.unwrap_or(&empty))?;
    Ok(Some(canonical.into_bytes()))
}

/// Encode `context` and `ciphertext` as a current-version packet.
pub fn encode(context: Option<&EncryptionContext>, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let context_bytes = context.map(|c| c.serialize()).transpose()?;

    let ct_len = u32::try_from(ciphertext.len()).map_err(|_| EnvelopeError::CiphertextTooLarge {
        len: ciphertext.len(),
    })?;

    let ctx_section = context_bytes
        .as_ref()
        .map_or(0, |c| V2_SECTION_OVERHEAD + c.len());
    let mut out =
        Vec::with_capacity(V2_HEADER_BYTES + ctx_section + V2_SECTION_OVERHEAD + ciphertext.len());

    out.push(VERSION_CURRENT);
    out.extend_from_slice(&RESERVED_V2);

    if let Some(ctx) = &context_bytes {
        let ctx_len = u32::try_from(ctx.len()).map_err(|_| EnvelopeError::ContextTooLarge {
            size: ctx.len(),
            max: u32::MAX as usize,
        })?;
        out.push(TAG_ENCRYPTION_CONTEXT);
        out.extend_from_slice(&ctx_len.to_be_bytes());
        out.extend_from_slice(ctx.as_bytes());
    }

    out.push(TAG_SIZED_CIPHERTEXT);
    out.extend_from_slice(&ct_len.to_be_bytes());
    out.extend_from_slice(ciphertext);

    Ok(out)
}

/// Decode a tag/length packet and verify its context against `expected`.
///
/// Ciphertext is only returned once the context check has passed.
pub fn decode(
    bytes: &[u8],
    expected: Option<&EncryptionContext>,
) -> Result<(Option<EncryptionContext>, Vec<u8>)> {
    let parsed = parse(bytes).map_err(|e| {
        debug!(
            error = %e,
            version = ?bytes.first(),
            len = bytes.len(),
            "tag/length packet rejected"
        );
        e
    })?;

    if let Err(e) = verify_context(parsed.context.as_ref(), expected) {
        let fingerprint = parsed
            .context
            .as_ref()
            .and_then(|c| c.serialize().ok())
            .map(|s| context_fingerprint(s.as_bytes()));
        warn!(
            dialect = parsed.dialect.name(),
            packet_context = fingerprint.as_deref().unwrap_or("none"),
            expected_present = expected.is_some(),
            error = %e,
            "encryption context verification failed"
        );
        return Err(e);
    }

    Ok((parsed.context, parsed.ciphertext.to_vec()))
}

/// Structure of a tag/length packet before context verification.
#[derive(Debug)]
pub(crate) struct ParsedPacket<'a> {
    pub(crate) dialect: Dialect,
    pub(crate) legacy_keys: Vec<WellKnownKey>,
    pub(crate) context: Option<EncryptionContext>,
    pub(crate) ciphertext: &'a [u8],
}

/// Parse without verifying the context. Never hand the result's ciphertext
/// to a caller as authenticated.
pub(crate) fn parse(bytes: &[u8]) -> Result<ParsedPacket<'_>> {
    let mut r = Reader::new(bytes);
    let version = r.u8("missing version byte")?;
    match Dialect::from_byte(version)? {
        Dialect::TagLengthV2 => parse_v2(&mut r),
        Dialect::TagLengthV1 => parse_v1(&mut r),
        Dialect::Varint => Err(EnvelopeError::UnsupportedVersion { version }),
    }
}

fn parse_v2<'a>(r: &mut Reader<'a>) -> Result<ParsedPacket<'a>> {
    r.bytes(RESERVED_BYTES, "truncated reserved field")?;

    let context = match r.u8("missing entry tag")? {
        TAG_ENCRYPTION_CONTEXT => {
            let len = r.u32_be("truncated context length")? as usize;
            let body = r.bytes(len, "context section exceeds packet")?;
            let context = context_from_bytes(body)?;
            if r.u8("missing ciphertext tag")? != TAG_SIZED_CIPHERTEXT {
                return Err(EnvelopeError::MalformedPacket(
                    "expected ciphertext after context",
                ));
            }
            Some(context)
        }
        TAG_SIZED_CIPHERTEXT => None,
        _ => return Err(EnvelopeError::MalformedPacket("unknown entry tag")),
    };

    let len = r.u32_be("truncated ciphertext length")? as usize;
    let ciphertext = r.bytes(len, "ciphertext section exceeds packet")?;
    r.finish()?;

    Ok(ParsedPacket {
        dialect: Dialect::TagLengthV2,
        legacy_keys: Vec::new(),
        context,
        ciphertext,
    })
}

fn parse_v1<'a>(r: &mut Reader<'a>) -> Result<ParsedPacket<'a>> {
    let mask = u32::from_be_bytes(r.array::<LEGACY_MASK_BYTES>("truncated key mask")?);
    let legacy_keys = keys_from_mask(mask)?;

    let mut context = None;
    let mut tag = r.u8("missing entry tag")?;
    match tag {
        TAG_EXPANDED_CONTEXT_DESCRIPTION => {
            if legacy_keys.is_empty() {
                return Err(EnvelopeError::MalformedPacket(
                    "expanded description without key bits",
                ));
            }
            let len = r.u16_be("truncated description length")? as usize;
            let extra = context_from_bytes(r.bytes(len, "description exceeds packet")?)?;
            let placeholders = legacy_keys.iter().map(|k| (k.name(), None));
            let merged = EncryptionContext::from_entries(placeholders.chain(extra.iter()))
                .map_err(|_| EnvelopeError::MalformedPacket("description repeats a key bit"))?;
            context = Some(merged);
            tag = r.u8("missing ciphertext tag")?;
        }
        TAG_ENCRYPTION_CONTEXT => {
            if !legacy_keys.is_empty() {
                return Err(EnvelopeError::MalformedPacket(
                    "encryption context alongside key bits",
                ));
            }
            let len = r.u16_be("truncated context length")? as usize;
            context = Some(context_from_bytes(r.bytes(len, "context section exceeds packet")?)?);
            tag = r.u8("missing ciphertext tag")?;
        }
        _ => {
            if !legacy_keys.is_empty() {
                let placeholders = legacy_keys.iter().map(|k| (k.name(), None::<String>));
                context = Some(EncryptionContext::from_entries(placeholders)?);
            }
        }
    }

    if tag != TAG_CIPHERTEXT {
        return Err(EnvelopeError::MalformedPacket("expected ciphertext tag"));
    }

    Ok(ParsedPacket {
        dialect: Dialect::TagLengthV1,
        legacy_keys,
        context,
        ciphertext: r.rest(),
    })
}

fn context_from_bytes(body: &[u8]) -> Result<EncryptionContext> {
    let s = std::str::from_utf8(body)
        .map_err(|_| EnvelopeError::MalformedPacket("context is not UTF-8"))?;
    EncryptionContext::parse(s).map_err(|_| EnvelopeError::MalformedPacket("invalid encryption context"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(s: &str) -> EncryptionContext {
        EncryptionContext::parse(s).unwrap()
    }

    #[test]
    fn layout_without_context() {
        let bytes = encode(None, b"ct").unwrap();
        assert_eq!(bytes, [0x02, 0, 0, 0, 0, TAG_SIZED_CIPHERTEXT, 0, 0, 0, 2, b'c', b't']);
    }

    #[test]
    fn layout_with_context() {
        let bytes = encode(Some(&ctx("k=v")), b"x").unwrap();
        let mut want = vec![0x02, 0, 0, 0, 0, TAG_ENCRYPTION_CONTEXT, 0, 0, 0, 3];
        want.extend_from_slice(b"k=v");
        want.extend_from_slice(&[TAG_SIZED_CIPHERTEXT, 0, 0, 0, 1, b'x']);
        assert_eq!(bytes, want);
    }

    #[test]
    fn reserved_field_is_ignored_on_decode() {
        let mut bytes = encode(None, b"ct").unwrap();
        bytes[1..5].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let (context, ct) = decode(&bytes, None).unwrap();
        assert!(context.is_none());
        assert_eq!(ct, b"ct");
    }

    #[test]
    fn varint_magic_is_not_a_tag_length_version() {
        assert_eq!(
            parse(&[0xEE, 0x00]).unwrap_err(),
            EnvelopeError::UnsupportedVersion { version: 0xEE }
        );
    }

    #[test]
    fn builder_defers_ciphertext() {
        let builder = Packet::builder().context(ctx("table_name|key=value"));
        let extra = ctx("table_name=orders");
        assert_eq!(
            builder.aad(Some(&extra)).unwrap().unwrap(),
            b"key=value|table_name=orders"
        );
        let packet = builder.ciphertext(b"sealed".to_vec());
        assert_eq!(packet.ciphertext(), b"sealed");
        assert!(packet.aad(None).is_err());
    }
}
