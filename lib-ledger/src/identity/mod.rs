//! Identity resolution: versioned entity keys and request authenticators.
//!
//! Every signature check in the engine resolves through
//! [`IdentityRegistry::authenticator`]. Entities rotate keys by registering
//! a new `key_version`; old versions remain resolvable so historical
//! signatures verify against the key that was active when they were made.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::storage::{LedgerStore, StorageError};
use lib_crypto::{hmac_verify, verify_signature};

/// Key material for one `(entity_id, key_version)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityKey {
    /// Ed25519 verifying key bytes (digital-signature mode).
    Certificate(Vec<u8>),
    /// Shared HMAC secret (secret mode).
    Secret(Vec<u8>),
}

/// One registered identity key version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKeyEntry {
    pub entity_id: String,
    pub key_version: u32,
    pub key: IdentityKey,
}

/// Verifies request signatures for one resolved identity key.
pub trait RequestAuthenticator: Send + Sync {
    /// True when `signature` verifies over `message` for this key.
    fn validate(&self, message: &[u8], signature: &[u8]) -> LedgerResult<bool>;
}

struct CertificateAuthenticator {
    public_key: Vec<u8>,
}

impl RequestAuthenticator for CertificateAuthenticator {
    fn validate(&self, message: &[u8], signature: &[u8]) -> LedgerResult<bool> {
        // Malformed signature material counts as non-verifying, not as an
        // engine failure: forged bytes must map to a signature error.
        match verify_signature(message, signature, &self.public_key) {
            Ok(valid) => Ok(valid),
            Err(_) => Ok(false),
        }
    }
}

struct SecretAuthenticator {
    secret: Vec<u8>,
}

impl RequestAuthenticator for SecretAuthenticator {
    fn validate(&self, message: &[u8], signature: &[u8]) -> LedgerResult<bool> {
        Ok(hmac_verify(&self.secret, message, signature))
    }
}

/// Resolves an entity's identity keys to authenticators.
pub struct IdentityRegistry {
    store: Arc<dyn LedgerStore>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Register one key version for an entity. Rotation is registering a
    /// higher version; re-registering an existing version is rejected.
    pub fn register(&self, entry: IdentityKeyEntry) -> LedgerResult<()> {
        match self.store.put_identity(&entry) {
            Ok(()) => {
                info!(
                    entity_id = %entry.entity_id,
                    key_version = entry.key_version,
                    "registered identity key"
                );
                Ok(())
            }
            Err(StorageError::AlreadyExists { .. }) => {
                Err(LedgerError::IdentityAlreadyRegistered {
                    entity_id: entry.entity_id,
                    key_version: entry.key_version,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Authenticator for the key registered under
    /// `(entity_id, key_version)` — current or historical.
    pub fn authenticator(
        &self,
        entity_id: &str,
        key_version: u32,
    ) -> LedgerResult<Box<dyn RequestAuthenticator>> {
        let entry = self
            .store
            .get_identity(entity_id, key_version)?
            .ok_or_else(|| LedgerError::IdentityNotFound {
                entity_id: entity_id.to_string(),
                key_version,
            })?;
        Ok(match entry.key {
            IdentityKey::Certificate(public_key) => {
                Box::new(CertificateAuthenticator { public_key })
            }
            IdentityKey::Secret(secret) => Box::new(SecretAuthenticator { secret }),
        })
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use lib_crypto::{hmac_sign, KeyPair};

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn certificate_mode_round_trip() {
        let registry = registry();
        let pair = KeyPair::generate();
        registry
            .register(IdentityKeyEntry {
                entity_id: "e".into(),
                key_version: 1,
                key: IdentityKey::Certificate(pair.public_key()),
            })
            .unwrap();
        let auth = registry.authenticator("e", 1).unwrap();
        let sig = pair.sign(b"request");
        assert!(auth.validate(b"request", &sig).unwrap());
        assert!(!auth.validate(b"other", &sig).unwrap());
    }

    #[test]
    fn secret_mode_round_trip() {
        let registry = registry();
        registry
            .register(IdentityKeyEntry {
                entity_id: "e".into(),
                key_version: 1,
                key: IdentityKey::Secret(b"shared".to_vec()),
            })
            .unwrap();
        let auth = registry.authenticator("e", 1).unwrap();
        let tag = hmac_sign(b"shared", b"request");
        assert!(auth.validate(b"request", &tag).unwrap());
    }

    #[test]
    fn rotation_keeps_old_versions_resolvable() {
        let registry = registry();
        let v1 = KeyPair::generate();
        let v2 = KeyPair::generate();
        for (version, pair) in [(1, &v1), (2, &v2)] {
            registry
                .register(IdentityKeyEntry {
                    entity_id: "e".into(),
                    key_version: version,
                    key: IdentityKey::Certificate(pair.public_key()),
                })
                .unwrap();
        }
        // A signature made under v1 verifies through v1, not v2.
        let sig = v1.sign(b"historical");
        assert!(registry
            .authenticator("e", 1)
            .unwrap()
            .validate(b"historical", &sig)
            .unwrap());
        assert!(!registry
            .authenticator("e", 2)
            .unwrap()
            .validate(b"historical", &sig)
            .unwrap());
    }

    #[test]
    fn duplicate_version_rejected_and_unknown_not_found() {
        let registry = registry();
        let entry = IdentityKeyEntry {
            entity_id: "e".into(),
            key_version: 1,
            key: IdentityKey::Secret(vec![1]),
        };
        registry.register(entry.clone()).unwrap();
        assert!(matches!(
            registry.register(entry),
            Err(LedgerError::IdentityAlreadyRegistered { .. })
        ));
        assert!(matches!(
            registry.authenticator("missing", 1),
            Err(LedgerError::IdentityNotFound { .. })
        ));
    }
}
