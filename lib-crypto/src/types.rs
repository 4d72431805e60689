//! Canonical crypto types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by the crypto collaborator.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid signature encoding: expected {expected} bytes, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },

    #[error("Invalid hash encoding: {0}")]
    InvalidHash(String),
}

/// A 32-byte canonical content digest.
///
/// `Hash::EMPTY` is the chain-start sentinel: it is distinct from the hash
/// of any input because it never leaves the engine as a computed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Chain-start sentinel (all zeros).
    pub const EMPTY: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s).map_err(|e| CryptoError::InvalidHash(e.to_string()))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidHash("expected 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// True for the chain-start sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Detached signature bytes (Ed25519: 64 bytes; HMAC tag: 32 bytes).
pub type Signature = Vec<u8>;

/// Serialized verifying-key bytes (Ed25519: 32 bytes).
pub type PublicKeyBytes = Vec<u8>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_round_trip() {
        let h = Hash::new([7u8; 32]);
        let parsed = Hash::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn empty_sentinel_is_all_zeros() {
        assert!(Hash::EMPTY.is_empty());
        assert!(!Hash::new([1u8; 32]).is_empty());
    }

    #[test]
    fn from_hex_rejects_short_input() {
        assert!(Hash::from_hex("abcd").is_err());
    }
}
