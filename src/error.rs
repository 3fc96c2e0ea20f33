//! Unified error type for context canonicalization and envelope framing.

use thiserror::Error;

/// Every failure the codec can raise.
///
/// Decode-side variants are terminal: the call that raised them never
/// releases ciphertext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Two context keys normalize to the same identity.
    #[error("duplicate context key: {key}")]
    DuplicateContextKey { key: String },

    /// A key or value contains `=` or `|`.
    #[error("{}", forbidden_message(.keys))]
    ForbiddenCharacter { keys: Vec<String> },

    /// A key (or, in the varint dialect, a value) is empty after normalization.
    #[error("empty context entry for key {key:?}")]
    EmptyContextEntry { key: String },

    /// The serialized varint-dialect context exceeds the configured bound.
    #[error("serialized context is {size} bytes, max {max}")]
    ContextTooLarge { size: usize, max: usize },

    /// A single key or value does not fit the entry length field.
    #[error("context entry is {len} bytes, max {max}")]
    EntryTooLong { len: usize, max: usize },

    /// An absent base value has no counterpart in the additional context.
    #[error("no additional value supplied for context key {key}")]
    MissingAdditionalValue { key: String },

    /// The additional context tries to override a value the base already has.
    #[error("additional context conflicts with existing value for key {key}")]
    ConflictingAdditionalValue { key: String },

    /// The leading discriminator byte is not a known dialect or version.
    #[error("unsupported packet version {version}")]
    UnsupportedVersion { version: u8 },

    /// Structural violation while decoding.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// The packet context does not equal the caller's expected context.
    #[error("encryption context mismatch")]
    ContextMismatch,

    /// Ciphertext does not fit the 4-byte length field.
    #[error("ciphertext is {len} bytes, too large to frame")]
    CiphertextTooLarge { len: usize },
}

impl EnvelopeError {
    /// True for errors raised while parsing or verifying untrusted bytes.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion { .. } | Self::MalformedPacket(_) | Self::ContextMismatch
        )
    }
}

fn forbidden_message(keys: &[String]) -> String {
    let (noun, verb) = if keys.len() == 1 {
        ("key", "contains")
    } else {
        ("keys", "contain")
    };
    format!(
        "context {} [{}] {} forbidden characters '=' or '|'",
        noun,
        keys.join(", "),
        verb
    )
}

pub type Result<T> = core::result::Result<T, EnvelopeError>;
