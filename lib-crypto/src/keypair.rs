//! Ed25519 key pairs used by ledger, auditor and certificate-mode entities.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::types::{CryptoError, PublicKeyBytes, Signature};

/// An Ed25519 signing/verifying key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS entropy source.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self { signing }
    }

    /// Reconstruct a key pair from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Ed25519 seed must be 32 bytes".to_string()))?;
        Ok(Self {
            signing: SigningKey::from_bytes(&seed),
        })
    }

    /// Serialized verifying key (32 bytes), registered as an entity's
    /// certificate.
    pub fn public_key(&self) -> PublicKeyBytes {
        self.signing.verifying_key().to_bytes().to_vec()
    }

    /// Detached signature over `message` (64 bytes).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message).to_vec()
    }

    pub(crate) fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::verify_signature;

    #[test]
    fn sign_then_verify() {
        let pair = KeyPair::generate();
        let sig = pair.sign(b"request bytes");
        assert!(verify_signature(b"request bytes", &sig, &pair.public_key()).unwrap());
        assert!(!verify_signature(b"other bytes", &sig, &pair.public_key()).unwrap());
    }

    #[test]
    fn seed_round_trip_is_stable() {
        let pair = KeyPair::from_seed(&[9u8; 32]).unwrap();
        let again = KeyPair::from_seed(&[9u8; 32]).unwrap();
        assert_eq!(pair.public_key(), again.public_key());
        assert_eq!(pair.sign(b"m"), again.sign(b"m"));
    }

    #[test]
    fn bad_seed_length_rejected() {
        assert!(KeyPair::from_seed(&[1u8; 16]).is_err());
    }
}
