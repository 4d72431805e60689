//! Signed, portable proofs of one asset version.

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalWriter;
use lib_crypto::{Hash, KeyPair};

/// A signed attestation of one asset version's identity, age and hash.
///
/// Created at commit or on explicit retrieval; never mutated. Verifiable by
/// anyone holding the signer's public key, with no access to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetProof {
    pub id: String,
    pub age: u64,
    pub hash: Hash,
    pub signature: Vec<u8>,
}

impl AssetProof {
    /// Canonical signing bytes: `(id, age, hash)` length-prefixed.
    pub fn signing_bytes(id: &str, age: u64, hash: &Hash) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.field(id.as_bytes());
        w.u64_raw(age);
        w.field(hash.as_ref());
        w.finish()
    }

    /// Verify this proof against a serialized verifying key.
    pub fn verify_with(&self, public_key: &[u8]) -> bool {
        let bytes = Self::signing_bytes(&self.id, self.age, &self.hash);
        lib_crypto::verify_signature(&bytes, &self.signature, public_key).unwrap_or(false)
    }
}

/// Produces ledger-signed (and optionally auditor-signed) proofs.
///
/// When an auditor key is configured the engine runs in dual-control mode:
/// every proof set carries two independently verifiable witnesses of the
/// same commit.
pub struct ProofComposer {
    ledger_key: KeyPair,
    auditor_key: Option<KeyPair>,
}

impl ProofComposer {
    pub fn new(ledger_key: KeyPair, auditor_key: Option<KeyPair>) -> Self {
        Self {
            ledger_key,
            auditor_key,
        }
    }

    pub fn ledger_public_key(&self) -> Vec<u8> {
        self.ledger_key.public_key()
    }

    pub fn auditor_public_key(&self) -> Option<Vec<u8>> {
        self.auditor_key.as_ref().map(|k| k.public_key())
    }

    pub fn dual_control(&self) -> bool {
        self.auditor_key.is_some()
    }

    /// Compose the ledger proof and, in dual-control mode, the auditor
    /// proof for one committed version.
    pub fn compose(&self, id: &str, age: u64, hash: &Hash) -> (AssetProof, Option<AssetProof>) {
        let bytes = AssetProof::signing_bytes(id, age, hash);
        let ledger = AssetProof {
            id: id.to_string(),
            age,
            hash: *hash,
            signature: self.ledger_key.sign(&bytes),
        };
        let auditor = self.auditor_key.as_ref().map(|key| AssetProof {
            id: id.to_string(),
            age,
            hash: *hash,
            signature: key.sign(&bytes),
        });
        (ledger, auditor)
    }
}

impl std::fmt::Debug for ProofComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofComposer")
            .field("dual_control", &self.dual_control())
            .finish_non_exhaustive()
    }
}
