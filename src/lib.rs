//! # Context Envelope
//!
//! Binary envelope that frames ciphertext together with the encryption
//! context (AAD) it was produced under, and reconstructs both from untrusted
//! bytes without ever accepting a context the caller did not ask for.
//!
//! ## Quick Start
//!
//! ```rust
//! use context_envelope::{EncryptionContext, Packet};
//!
//! let ctx = EncryptionContext::from_pairs([("table_name", "orders"), ("key", "value")]).unwrap();
//!
//! // AAD for the encryption provider
//! let aad = Packet::builder().context(ctx.clone()).aad(None).unwrap().unwrap();
//! assert_eq!(aad, b"key=value|table_name=orders");
//!
//! let ciphertext = b"opaque provider output".to_vec();
//! let wire = Packet::new(Some(ctx.clone()), ciphertext.clone()).encode().unwrap();
//!
//! let packet = Packet::decode(&wire, Some(&ctx)).unwrap();
//! assert_eq!(packet.ciphertext(), ciphertext.as_slice());
//! ```
//!
//! ## Dialects
//!
//! - **Tag/length v2**: current format, written by [`Packet::encode`]
//! - **Tag/length v1**: legacy, decode only, well-known keys as a bitmask
//! - **Varint**: [`sealed::serialize`] / [`sealed::deserialize`], context
//!   canonicalized by [`aad::serialize_context`]
//!
//! The first byte selects the dialect; the three never overlap.
//!
//! ## What's NOT Provided
//!
//! - Encryption or decryption (bring your own AEAD)
//! - Key management
//! - Confidentiality or integrity on its own

#![deny(unsafe_code)]

// ---------------------------------------------------------------------------
// Internal modules
// ---------------------------------------------------------------------------

mod error;
mod reader;

// ---------------------------------------------------------------------------
// Public modules
// ---------------------------------------------------------------------------

pub mod aad;
pub mod context;
pub mod inspect;
pub mod packet;
pub mod sealed;
pub mod varint;
pub mod well_known;
pub mod wire;

pub use context::{verify_context, EncryptionContext};
pub use error::{EnvelopeError, Result};
pub use inspect::{inspect, PacketInfo};
pub use packet::{Packet, PacketBuilder};
pub use sealed::SealedParts;
pub use well_known::WellKnownKey;
pub use wire::{Dialect, VARINT_MAGIC, VERSION_CURRENT, VERSION_LEGACY};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
