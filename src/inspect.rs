//! Structural inspection of any packet, without context verification.
//!
//! Useful for logging and operational tooling. Never returns ciphertext
//! bytes, only their length.

use std::fmt;

use crate::error::Result;
use crate::wire::{context_fingerprint, Dialect};
use crate::{packet, sealed};

/// Packet metadata extracted without verifying the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInfo {
    pub dialect: Dialect,
    pub version: u8,
    /// Whether a context section is present.
    pub has_context: bool,
    /// Fingerprint of the canonical context bytes, if any.
    pub context_fingerprint: Option<String>,
    /// Keys named by a legacy v1 bitmask.
    pub legacy_keys: Vec<&'static str>,
    /// Keys whose values must be supplied by the caller.
    pub placeholder_keys: Vec<String>,
    pub ciphertext_bytes: usize,
    pub total_bytes: usize,
}

impl fmt::Display for PacketInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (0x{:02X}) | context: {} | {} bytes ({} ciphertext)",
            self.dialect.name(),
            self.version,
            self.context_fingerprint.as_deref().unwrap_or("none"),
            self.total_bytes,
            self.ciphertext_bytes
        )
    }
}

/// Inspect packet structure.
pub fn inspect(bytes: &[u8]) -> Result<PacketInfo> {
    let dialect = Dialect::detect(bytes)?;
    match dialect {
        Dialect::Varint => {
            let parts = sealed::parse(bytes)?;
            Ok(PacketInfo {
                dialect,
                version: dialect.version_byte(),
                has_context: parts.aad.is_some(),
                context_fingerprint: parts.aad.map(context_fingerprint),
                legacy_keys: Vec::new(),
                placeholder_keys: Vec::new(),
                ciphertext_bytes: parts.ciphertext.len(),
                total_bytes: bytes.len(),
            })
        }
        Dialect::TagLengthV1 | Dialect::TagLengthV2 => {
            let parsed = packet::parse(bytes)?;
            let canonical = parsed.context.as_ref().map(|c| c.serialize()).transpose()?;
            Ok(PacketInfo {
                dialect,
                version: dialect.version_byte(),
                has_context: parsed.context.is_some(),
                context_fingerprint: canonical.map(|s| context_fingerprint(s.as_bytes())),
                legacy_keys: parsed.legacy_keys.iter().map(|k| k.name()).collect(),
                placeholder_keys: parsed
                    .context
                    .iter()
                    .flat_map(|c| c.placeholders())
                    .map(str::to_owned)
                    .collect(),
                ciphertext_bytes: parsed.ciphertext.len(),
                total_bytes: bytes.len(),
            })
        }
    }
}
