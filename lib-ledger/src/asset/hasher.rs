//! Content hashing of asset versions.
//!
//! Pure function of the version's own fields plus the chain's `prev_hash`.
//! The field order and the length-prefix scheme come from
//! [`crate::canonical`] and are protocol.

use crate::asset::AssetVersion;
use crate::canonical::CanonicalWriter;
use crate::contract::ContractKey;
use lib_crypto::Hash;

/// Computes the tamper-evidence anchor for one asset version.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetHasher;

impl AssetHasher {
    /// Digest over `(id, age, input, data, contract_id, argument,
    /// signature, prev_hash)`. The age-0 sentinel `prev_hash` is encoded
    /// as an empty field.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        id: &str,
        age: u64,
        input: &str,
        data: &str,
        contract_id: &ContractKey,
        argument: &str,
        signature: &[u8],
        prev_hash: &Hash,
    ) -> Hash {
        let mut w = CanonicalWriter::new();
        w.field(id.as_bytes());
        w.u64_raw(age);
        w.field(input.as_bytes());
        w.field(data.as_bytes());
        w.field(contract_id.to_string().as_bytes());
        w.field(argument.as_bytes());
        w.field(signature);
        if prev_hash.is_empty() {
            w.field(&[]);
        } else {
            w.field(prev_hash.as_ref());
        }
        lib_crypto::hash(&w.finish())
    }

    /// Recompute the digest of a stored version from its own fields.
    pub fn recompute(version: &AssetVersion) -> Hash {
        Self::compute(
            &version.id,
            version.age,
            &version.input,
            &version.data,
            &version.contract_id,
            &version.argument,
            &version.signature,
            &version.prev_hash,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ContractKey {
        ContractKey::new("entity", 1, "state-updater")
    }

    #[test]
    fn digest_is_deterministic() {
        let a = AssetHasher::compute("a", 0, "{}", r#"{"x":1}"#, &key(), "{}", b"sig", &Hash::EMPTY);
        let b = AssetHasher::compute("a", 0, "{}", r#"{"x":1}"#, &key(), "{}", b"sig", &Hash::EMPTY);
        assert_eq!(a, b);
    }

    #[test]
    fn every_field_is_digest_relevant() {
        let base = AssetHasher::compute("a", 0, "{}", "{}", &key(), "{}", b"sig", &Hash::EMPTY);
        let variants = [
            AssetHasher::compute("b", 0, "{}", "{}", &key(), "{}", b"sig", &Hash::EMPTY),
            AssetHasher::compute("a", 1, "{}", "{}", &key(), "{}", b"sig", &Hash::EMPTY),
            AssetHasher::compute("a", 0, "{ }", "{}", &key(), "{}", b"sig", &Hash::EMPTY),
            AssetHasher::compute("a", 0, "{}", "{ }", &key(), "{}", b"sig", &Hash::EMPTY),
            AssetHasher::compute("a", 0, "{}", "{}", &ContractKey::new("entity", 2, "state-updater"), "{}", b"sig", &Hash::EMPTY),
            AssetHasher::compute("a", 0, "{}", "{}", &key(), "{ }", b"sig", &Hash::EMPTY),
            AssetHasher::compute("a", 0, "{}", "{}", &key(), "{}", b"sih", &Hash::EMPTY),
            AssetHasher::compute("a", 0, "{}", "{}", &key(), "{}", b"sig", &Hash::new([1u8; 32])),
        ];
        for v in variants {
            assert_ne!(base, v);
        }
    }

    #[test]
    fn single_bit_flip_changes_digest() {
        let a = AssetHasher::compute("a", 0, "{}", r#"{"x":1}"#, &key(), "{}", b"sig", &Hash::EMPTY);
        let b = AssetHasher::compute("a", 0, "{}", r#"{"x":0}"#, &key(), "{}", b"sig", &Hash::EMPTY);
        assert_ne!(a, b);
    }
}
