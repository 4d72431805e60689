//! Canonical byte encoding for hashed and signed material.
//!
//! The concatenation scheme is protocol. Changing field order, the length
//! prefix width, or the JSON key ordering breaks every stored hash and
//! signature, so the rules are fixed here and nowhere else:
//!
//! - every variable-length field is prefixed with its byte length as a
//!   4-byte big-endian `u32`;
//! - `u64` values (ages) are written raw as 8 big-endian bytes;
//! - `u32` values (key versions) are written raw as 4 big-endian bytes;
//! - the age-0 `prev_hash` sentinel is encoded as a zero-length field;
//! - canonical JSON text is compact `serde_json` output, which orders
//!   object keys lexicographically (the `preserve_order` feature is
//!   deliberately not enabled anywhere in this workspace).

use serde_json::Value;

/// Incremental writer for the canonical concatenation.
#[derive(Debug, Default)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a length-prefixed variable-length field.
    pub fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a raw 8-byte big-endian `u64` (no length prefix).
    pub fn u64_raw(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a raw 4-byte big-endian `u32` (no length prefix).
    pub fn u32_raw(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Canonical JSON text of `value`: compact, sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    // serde_json's Map is a BTreeMap here, so serialization is key-sorted.
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_is_unambiguous() {
        // ("ab", "c") and ("a", "bc") must encode differently.
        let mut a = CanonicalWriter::new();
        a.field(b"ab").field(b"c");
        let mut b = CanonicalWriter::new();
        b.field(b"a").field(b"bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn empty_field_is_distinct_from_absent_field() {
        let mut a = CanonicalWriter::new();
        a.field(b"x").field(b"");
        let mut b = CanonicalWriter::new();
        b.field(b"x");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn u64_is_big_endian() {
        let mut w = CanonicalWriter::new();
        w.u64_raw(3);
        assert_eq!(w.finish(), vec![0, 0, 0, 0, 0, 0, 0, 3]);
    }

    #[test]
    fn canonical_json_sorts_object_keys() {
        let v: Value = serde_json::from_str(r#"{"z":1,"a":{"y":2,"b":3}}"#).unwrap();
        assert_eq!(canonical_json(&v), r#"{"a":{"b":3,"y":2},"z":1}"#);
    }

    #[test]
    fn canonical_json_is_stable_across_parses() {
        let text = r#"{"nonce":"n1","state":42}"#;
        let v: Value = serde_json::from_str(text).unwrap();
        let reparsed: Value = serde_json::from_str(&canonical_json(&v)).unwrap();
        assert_eq!(canonical_json(&v), canonical_json(&reparsed));
    }
}
