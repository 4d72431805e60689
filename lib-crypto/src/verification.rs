//! Detached Ed25519 signature verification.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};

use crate::types::CryptoError;

/// Verify a detached Ed25519 signature against a message and a serialized
/// verifying key.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify;
/// malformed key or signature material is an error, not a mere mismatch.
pub fn verify_signature(
    message: &[u8],
    signature: &[u8],
    public_key: &[u8],
) -> Result<bool, CryptoError> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", public_key.len())))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let sig_bytes: [u8; 64] =
        signature
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength {
                expected: 64,
                got: signature.len(),
            })?;
    let sig = DalekSignature::from_bytes(&sig_bytes);

    Ok(key.verify(message, &sig).is_ok())
}
