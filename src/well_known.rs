//! Well-known context keys used by the legacy v1 bitmask.
//!
//! The table is closed and version-pinned: a v1 packet names keys by setting
//! the matching bit, and the caller supplies the values at use time.

use crate::error::{EnvelopeError, Result};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WellKnownKey {
    Undefined = 1 << 0,
    TableName = 1 << 1,
    DatabaseName = 1 << 2,
    ColumnName = 1 << 3,
    ShardName = 1 << 4,
    PrimaryId = 1 << 5,
    EventTopic = 1 << 6,
    ServiceName = 1 << 7,
    CustomerToken = 1 << 8,
}

impl WellKnownKey {
    /// Fixed table order, lowest bit first.
    pub const ALL: [WellKnownKey; 9] = [
        Self::Undefined,
        Self::TableName,
        Self::DatabaseName,
        Self::ColumnName,
        Self::ShardName,
        Self::PrimaryId,
        Self::EventTopic,
        Self::ServiceName,
        Self::CustomerToken,
    ];

    pub const fn bit(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::TableName => "table_name",
            Self::DatabaseName => "database_name",
            Self::ColumnName => "column_name",
            Self::ShardName => "shard_name",
            Self::PrimaryId => "primary_id",
            Self::EventTopic => "event_topic",
            Self::ServiceName => "service_name",
            Self::CustomerToken => "customer_token",
        }
    }
}

/// Every bit a v1 decoder can resolve to a key name.
pub const KNOWN_BITS: u32 = WellKnownKey::TableName.bit()
    | WellKnownKey::DatabaseName.bit()
    | WellKnownKey::ColumnName.bit()
    | WellKnownKey::ShardName.bit()
    | WellKnownKey::PrimaryId.bit()
    | WellKnownKey::EventTopic.bit()
    | WellKnownKey::ServiceName.bit()
    | WellKnownKey::CustomerToken.bit();

/// Resolve a bitmask into its keys, in table order.
///
/// The `undefined` bit and bits outside the table are rejected.
pub fn keys_from_mask(mask: u32) -> Result<Vec<WellKnownKey>> {
    if mask & !KNOWN_BITS != 0 {
        return Err(EnvelopeError::MalformedPacket("unknown context key bit"));
    }
    Ok(WellKnownKey::ALL
        .into_iter()
        .filter(|k| mask & k.bit() != 0)
        .collect())
}

/// Build a bitmask from keys.
pub fn mask_from_keys(keys: &[WellKnownKey]) -> u32 {
    keys.iter().fold(0, |mask, k| mask | k.bit())
}
