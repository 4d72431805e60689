//! Canonical content hashing.
//!
//! BLAKE3 over the caller-supplied bytes. Callers are responsible for
//! producing an unambiguous byte encoding before hashing (the ledger's
//! canonical length-prefixed concatenation); this module only fixes the
//! hash primitive.

use crate::types::Hash;

/// Computes the canonical content hash of `data`.
pub fn hash(data: &[u8]) -> Hash {
    Hash(blake3::hash(data).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"asset version canonical bytes";
        assert_eq!(hash(data), hash(data));
    }

    #[test]
    fn hash_is_input_sensitive() {
        let a = hash(b"payload");
        let b = hash(b"payloae");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_matches_blake3() {
        let data = b"chain commitment";
        let expected: [u8; 32] = blake3::hash(data).into();
        assert_eq!(hash(data).0, expected);
    }
}
