//! Encryption context canonicalization (delimiter dialect).
//!
//! Canonical form:
//!   key1=value1|key2|key3=value3
//!
//! - keys are lower-cased on construction and must stay unique
//! - an absent value is emitted as a bare key (no trailing `=`)
//! - entries are ordered by lower(key) || lower(value), ascending byte order
//! - `=` and `|` are reserved and may not appear in keys or values

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{EnvelopeError, Result};

pub const ENTRY_SEPARATOR: char = '|';
pub const VALUE_SEPARATOR: char = '=';

/// Mapping from lower-cased key to an optional value.
///
/// An absent value means the key is bound to the ciphertext but its value is
/// supplied by the caller at use time (see [`EncryptionContext::serialize_with`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptionContext {
    entries: BTreeMap<String, Option<String>>,
}

impl EncryptionContext {
    /// Empty context (present, but with no entries).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from keys with optional values.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut ctx = Self::new();
        for (key, value) in entries {
            ctx.insert_unique(key.as_ref(), value.map(Into::into))?;
        }
        Ok(ctx)
    }

    /// Build a context where every key has a value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_entries(pairs.into_iter().map(|(k, v)| (k, Some(v))))
    }

    fn insert_unique(&mut self, key: &str, value: Option<String>) -> Result<()> {
        if key.is_empty() {
            return Err(EnvelopeError::EmptyContextEntry { key: String::new() });
        }
        let key = key.to_lowercase();
        if self.entries.contains_key(&key) {
            return Err(EnvelopeError::DuplicateContextKey { key });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// `None` if the key is missing, `Some(None)` if it is present without a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .get(&key.to_lowercase())
            .map(|v| v.as_deref())
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Keys whose value is absent.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
    }

    /// Canonical string form.
    pub fn serialize(&self) -> Result<String> {
        serialize_entries(&self.entries)
    }

    /// Canonical string form with absent values filled from `additional`.
    ///
    /// Every absent base value must be supplied by `additional`, and no
    /// present base value may be overridden by it. Keys only found in
    /// `additional` are carried into the output.
    pub fn serialize_with(&self, additional: &EncryptionContext) -> Result<String> {
        serialize_entries(&self.merged(additional)?)
    }

    /// The filled context itself, see [`serialize_with`](Self::serialize_with).
    pub fn fill(&self, additional: &EncryptionContext) -> Result<Self> {
        Ok(Self {
            entries: self.merged(additional)?,
        })
    }

    fn merged(&self, additional: &EncryptionContext) -> Result<BTreeMap<String, Option<String>>> {
        let mut merged = BTreeMap::new();
        for (key, value) in &self.entries {
            let extra = additional.entries.get(key);
            let filled = match (value, extra) {
                (None, Some(Some(v))) => v.clone(),
                (None, _) => {
                    return Err(EnvelopeError::MissingAdditionalValue { key: key.clone() })
                }
                (Some(_), Some(_)) => {
                    return Err(EnvelopeError::ConflictingAdditionalValue { key: key.clone() })
                }
                (Some(v), None) => v.clone(),
            };
            merged.insert(key.clone(), Some(filled));
        }
        for (key, value) in &additional.entries {
            if !self.entries.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(merged)
    }

    /// Inverse of [`serialize`](Self::serialize).
    ///
    /// `None` yields `None` (no context), `Some("")` yields an empty context.
    pub fn deserialize(serialized: Option<&str>) -> Result<Option<Self>> {
        serialized.map(Self::parse).transpose()
    }

    /// Parse a canonical (or hand-written) context string.
    pub fn parse(serialized: &str) -> Result<Self> {
        let mut ctx = Self::new();
        if serialized.is_empty() {
            return Ok(ctx);
        }
        for segment in serialized.split(ENTRY_SEPARATOR) {
            let (key, value) = match segment.split_once(VALUE_SEPARATOR) {
                Some((k, v)) => (k, Some(v)),
                None => (segment, None),
            };
            if value.is_some_and(|v| v.contains(VALUE_SEPARATOR)) {
                return Err(EnvelopeError::ForbiddenCharacter {
                    keys: vec![key.to_lowercase()],
                });
            }
            ctx.insert_unique(key, value.map(str::to_owned))?;
        }
        Ok(ctx)
    }

    /// This context with values blanked wherever `template` holds a placeholder.
    fn shaped_like(&self, template: &EncryptionContext) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(key, value)| match template.entries.get(key) {
                Some(None) => (key.clone(), None),
                _ => (key.clone(), value.clone()),
            })
            .collect();
        Self { entries }
    }
}

impl FromStr for EncryptionContext {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "<invalid context with {} entries>", self.len()),
        }
    }
}

fn sort_key(key: &str, value: Option<&str>) -> String {
    let mut s = key.to_lowercase();
    s.push_str(&value.unwrap_or("").to_lowercase());
    s
}

fn is_forbidden(s: &str) -> bool {
    s.contains(VALUE_SEPARATOR) || s.contains(ENTRY_SEPARATOR)
}

fn serialize_entries(entries: &BTreeMap<String, Option<String>>) -> Result<String> {
    let mut ordered: Vec<(&String, Option<&str>)> =
        entries.iter().map(|(k, v)| (k, v.as_deref())).collect();
    ordered.sort_by(|a, b| {
        sort_key(a.0, a.1)
            .cmp(&sort_key(b.0, b.1))
            .then_with(|| a.0.cmp(b.0))
    });

    let offenders: Vec<String> = ordered
        .iter()
        .filter(|(k, v)| is_forbidden(k) || v.is_some_and(is_forbidden))
        .map(|(k, _)| (*k).clone())
        .collect();
    if !offenders.is_empty() {
        return Err(EnvelopeError::ForbiddenCharacter { keys: offenders });
    }

    let mut out = String::new();
    for (i, (key, value)) in ordered.iter().enumerate() {
        if i > 0 {
            out.push(ENTRY_SEPARATOR);
        }
        out.push_str(key);
        if let Some(v) = value {
            out.push(VALUE_SEPARATOR);
            out.push_str(v);
        }
    }
    Ok(out)
}

/// Check a decoded packet context against the caller's expectation.
///
/// Absence must match absence. When both are present they are compared as
/// canonical bytes; placeholder entries in `packet` accept any value for the
/// same key in `expected`, but the key itself must be there. A side that
/// cannot be canonicalized never matches.
pub fn verify_context(
    packet: Option<&EncryptionContext>,
    expected: Option<&EncryptionContext>,
) -> Result<()> {
    match (packet, expected) {
        (None, None) => Ok(()),
        (Some(packet), Some(expected)) => {
            let (ours, theirs) = match (
                packet.serialize(),
                expected.shaped_like(packet).serialize(),
            ) {
                (Ok(ours), Ok(theirs)) => (ours, theirs),
                (Err(e), _) | (_, Err(e)) => {
                    debug!(error = %e, "context cannot be canonicalized for comparison");
                    return Err(EnvelopeError::ContextMismatch);
                }
            };
            if bool::from(ours.as_bytes().ct_eq(theirs.as_bytes())) {
                Ok(())
            } else {
                Err(EnvelopeError::ContextMismatch)
            }
        }
        _ => Err(EnvelopeError::ContextMismatch),
    }
}
