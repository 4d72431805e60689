//! Cryptography foundation for the veriledger engine.
//!
//! The ledger core never touches algorithm-specific types directly; it goes
//! through the small surface re-exported here:
//!
//! - [`hash`] / [`Hash`] — canonical content hash (BLAKE3)
//! - [`KeyPair`] / [`verify_signature`] — Ed25519 digital signatures
//! - [`hmac_sign`] / [`hmac_verify`] — HMAC-SHA256 secret-key authenticators
//!
//! # Canonical content hash
//!
//! **BLAKE3 is the canonical hash function for all chain-critical data.**
//! Asset hashes, prev-hash links and proof digests MUST use [`hash`]. Using
//! an alternate hash for chain commitments produces mismatched digests and
//! breaks tamper evidence.

pub mod hashing;
pub mod keypair;
pub mod secret;
pub mod types;
pub mod verification;

pub use hashing::hash;
pub use keypair::KeyPair;
pub use secret::{hmac_sign, hmac_verify};
pub use types::{CryptoError, Hash, PublicKeyBytes, Signature};
pub use verification::verify_signature;
