//! Encryption context canonicalization (varint dialect).
//!
//! Keys and values are normalized (whitespace, `-` and `_` removed, then
//! lower-cased), ordered by the key as the caller wrote it, and written as
//!
//!   varint(count) || { varint(key_len) || key || varint(value_len) || value }*
//!
//! An absent or empty context produces no bytes at all, so "no context" can
//! never collide with "one entry with an empty value" (which is rejected).

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EnvelopeError, Result};
use crate::reader::Reader;
use crate::varint::{encode_varint, varint_len};

/// Default bound on a serialized context.
pub const DEFAULT_MAX_CONTEXT_BYTES: usize = 16 * 1024;

/// Width of the entry length field.
pub const DEFAULT_MAX_ENTRY_BYTES: usize = u16::MAX as usize;

/// Size bounds applied when serializing a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_context_bytes: usize,
    pub max_entry_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_context_bytes: DEFAULT_MAX_CONTEXT_BYTES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

impl Limits {
    pub fn with_max_context_bytes(mut self, max: usize) -> Self {
        self.max_context_bytes = max;
        self
    }

    pub fn with_max_entry_bytes(mut self, max: usize) -> Self {
        self.max_entry_bytes = max;
        self
    }
}

/// Strip whitespace, `-` and `_`, then lower-case.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Serialize a context with [`Limits::default`].
///
/// Returns `None` when there is nothing to bind (absent or empty context).
pub fn serialize_context<I, K, V>(context: Option<I>) -> Result<Option<Vec<u8>>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    serialize_context_with_limits(context, &Limits::default())
}

pub fn serialize_context_with_limits<I, K, V>(
    context: Option<I>,
    limits: &Limits,
) -> Result<Option<Vec<u8>>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let Some(context) = context else {
        return Ok(None);
    };

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for (raw_key, raw_value) in context {
        let raw_key = raw_key.as_ref();
        let key = normalize(raw_key);
        let value = normalize(raw_value.as_ref());
        if key.is_empty() || value.is_empty() {
            return Err(EnvelopeError::EmptyContextEntry {
                key: raw_key.to_owned(),
            });
        }
        for part in [&key, &value] {
            if part.len() > limits.max_entry_bytes {
                return Err(EnvelopeError::EntryTooLong {
                    len: part.len(),
                    max: limits.max_entry_bytes,
                });
            }
        }
        if !seen.insert(key.clone()) {
            return Err(EnvelopeError::DuplicateContextKey { key });
        }
        entries.push((raw_key.to_owned(), key, value));
    }

    if entries.is_empty() {
        return Ok(None);
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let size = varint_len(entries.len() as u64)
        + entries
            .iter()
            .map(|(_, k, v)| {
                varint_len(k.len() as u64) + k.len() + varint_len(v.len() as u64) + v.len()
            })
            .sum::<usize>();
    if size > limits.max_context_bytes {
        return Err(EnvelopeError::ContextTooLarge {
            size,
            max: limits.max_context_bytes,
        });
    }

    let mut out = Vec::with_capacity(size);
    encode_varint(entries.len() as u64, &mut out);
    for (_, key, value) in &entries {
        encode_varint(key.len() as u64, &mut out);
        out.extend_from_slice(key.as_bytes());
        encode_varint(value.len() as u64, &mut out);
        out.extend_from_slice(value.as_bytes());
    }
    debug_assert_eq!(out.len(), size);

    Ok(Some(out))
}

/// Inverse of [`serialize_context`], for diagnostics.
///
/// Strict: short reads, trailing bytes, empty entries and repeated keys are
/// all rejected.
pub fn parse_context(bytes: &[u8]) -> Result<BTreeMap<String, String>> {
    let mut r = Reader::new(bytes);
    let count = r.varint()?;
    if count == 0 || count > r.remaining() as u64 {
        return Err(EnvelopeError::MalformedPacket("bad context entry count"));
    }

    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let key = utf8(r.varint_prefixed("context key exceeds buffer")?)?;
        let value = utf8(r.varint_prefixed("context value exceeds buffer")?)?;
        if key.is_empty() || value.is_empty() {
            return Err(EnvelopeError::EmptyContextEntry { key });
        }
        if entries.contains_key(&key) {
            return Err(EnvelopeError::DuplicateContextKey { key });
        }
        entries.insert(key, value);
    }
    r.finish()?;
    Ok(entries)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| EnvelopeError::MalformedPacket("context entry is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ser(pairs: &[(&str, &str)]) -> Result<Option<Vec<u8>>> {
        serialize_context(Some(pairs.iter().copied()))
    }

    #[test]
    fn absent_and_empty_produce_nothing() {
        assert_eq!(serialize_context(None::<Vec<(&str, &str)>>).unwrap(), None);
        assert_eq!(ser(&[]).unwrap(), None);
    }

    #[test]
    fn byte_layout() {
        let bytes = ser(&[("b", "2"), ("a", "1")]).unwrap().unwrap();
        assert_eq!(bytes, [2, 1, b'a', 1, b'1', 1, b'b', 1, b'2']);
    }

    #[test]
    fn ordered_by_key_as_written() {
        // "Zeta" sorts before "alpha" byte-wise, although "zeta" would not
        let bytes = ser(&[("alpha", "2"), ("Zeta", "1")]).unwrap().unwrap();
        let mut want = vec![2, 4];
        want.extend_from_slice(b"zeta");
        want.extend_from_slice(&[1, b'1', 5]);
        want.extend_from_slice(b"alpha");
        want.extend_from_slice(&[1, b'2']);
        assert_eq!(bytes, want);
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize(" Table-Name_1 "), "tablename1");
        let a = ser(&[("Table-Name", "Orders DB")]).unwrap();
        let b = ser(&[("table_name", "ordersdb")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicates_after_normalization() {
        let err = ser(&[("table_name", "a"), ("TableName", "b")]).unwrap_err();
        assert_eq!(err, EnvelopeError::DuplicateContextKey { key: "tablename".into() });
    }

    #[test]
    fn empty_entries_rejected() {
        assert!(matches!(
            ser(&[("key", "")]).unwrap_err(),
            EnvelopeError::EmptyContextEntry { .. }
        ));
        assert!(matches!(
            ser(&[("-_ ", "value")]).unwrap_err(),
            EnvelopeError::EmptyContextEntry { .. }
        ));
    }

    #[test]
    fn size_limits() {
        let limits = Limits::default().with_max_context_bytes(8);
        let err = serialize_context_with_limits(Some([("key", "a-long-value")]), &limits)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::ContextTooLarge { max: 8, .. }));

        let limits = Limits::default().with_max_entry_bytes(4);
        let err = serialize_context_with_limits(Some([("key", "value")]), &limits).unwrap_err();
        assert_eq!(err, EnvelopeError::EntryTooLong { len: 5, max: 4 });
    }

    #[test]
    fn accepts_hash_maps() {
        let mut map = HashMap::new();
        map.insert("zone".to_string(), "eu".to_string());
        map.insert("app".to_string(), "billing".to_string());
        let bytes = serialize_context(Some(&map)).unwrap().unwrap();
        let parsed = parse_context(&bytes).unwrap();
        assert_eq!(parsed.get("app").map(String::as_str), Some("billing"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn parse_is_strict() {
        let bytes = ser(&[("a", "1")]).unwrap().unwrap();
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(parse_context(&trailing).is_err());
        assert!(parse_context(&bytes[..bytes.len() - 1]).is_err());
        assert!(parse_context(&[0]).is_err());
        assert!(parse_context(&[2, 1, b'a', 1, b'1', 1, b'a', 1, b'2']).is_err());
    }
}
