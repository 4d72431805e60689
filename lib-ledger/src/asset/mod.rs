//! Asset versions, filters, content hashing and proofs.

pub mod hasher;
pub mod proof;

pub use hasher::AssetHasher;
pub use proof::{AssetProof, ProofComposer};

use serde::{Deserialize, Serialize};

use crate::contract::ContractKey;
use lib_crypto::Hash;

/// One immutable version of a logical asset.
///
/// The fundamental unit of the ledger. Once committed it is never modified;
/// its `hash` is the tamper-evidence anchor and its `prev_hash` links it to
/// the preceding version (the [`Hash::EMPTY`] sentinel at age 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetVersion {
    /// Logical record key.
    pub id: String,

    /// Version number, 0-based, strictly increasing per id. Assigned at
    /// commit time, never by the caller.
    pub age: u64,

    /// Canonical JSON snapshot of the committed state the producing
    /// contract observed (`{id: {"age": n, "data": …}}`). Retained so the
    /// version can be deterministically replayed later.
    pub input: String,

    /// Canonical JSON text of the contract-produced payload. Opaque to the
    /// engine.
    pub data: String,

    /// Composite identifier binding this write to the exact registered
    /// contract and the exact identity version that registered it.
    pub contract_id: ContractKey,

    /// Canonical JSON of the invocation argument as supplied by the client
    /// (distinct from `input`, the ledger-observed replay seed). Carries
    /// the client nonce.
    pub argument: String,

    /// The client's signature over the original execution request, retained
    /// to allow later re-verification of authorship.
    #[serde(with = "serde_bytes_hex")]
    pub signature: Vec<u8>,

    /// Hash of the immediately preceding version ([`Hash::EMPTY`] at age 0).
    pub prev_hash: Hash,

    /// Content hash over this version's fields plus `prev_hash`.
    pub hash: Hash,
}

/// Scan ordering over a single asset's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgeOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter for scanning one asset id's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFilter {
    pub id: String,
    /// Inclusive lower age bound; `None` means 0.
    pub start_age: Option<u64>,
    /// Inclusive upper age bound; `None` means unbounded.
    pub end_age: Option<u64>,
    pub order: AgeOrder,
    pub limit: Option<usize>,
}

impl AssetFilter {
    /// Full ascending history of `id`.
    pub fn all(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_age: None,
            end_age: None,
            order: AgeOrder::Ascending,
            limit: None,
        }
    }

    /// Ascending history of `id` within `[start, end]` inclusive.
    pub fn range(id: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            id: id.into(),
            start_age: Some(start),
            end_age: Some(end),
            order: AgeOrder::Ascending,
            limit: None,
        }
    }

    /// Exactly one age of `id`.
    pub fn exact(id: impl Into<String>, age: u64) -> Self {
        Self::range(id, age, age)
    }

    pub fn matches(&self, age: u64) -> bool {
        self.start_age.map_or(true, |s| age >= s) && self.end_age.map_or(true, |e| age <= e)
    }
}

/// Hex (de)serialization for signature bytes, keeping JSON dumps readable.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_bounds_are_inclusive() {
        let f = AssetFilter::range("a", 2, 4);
        assert!(!f.matches(1));
        assert!(f.matches(2));
        assert!(f.matches(4));
        assert!(!f.matches(5));
    }

    #[test]
    fn all_filter_matches_everything() {
        let f = AssetFilter::all("a");
        assert!(f.matches(0));
        assert!(f.matches(u64::MAX));
    }
}
