//! HMAC-SHA256 authenticators for secret-mode identities.
//!
//! Entities that do not hold a certificate register a shared secret instead;
//! their request signatures are HMAC tags over the same canonical bytes the
//! certificate path signs.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::Signature;

type HmacSha256 = Hmac<Sha256>;

/// Compute the HMAC-SHA256 tag of `message` under `secret` (32 bytes).
pub fn hmac_sign(secret: &[u8], message: &[u8]) -> Signature {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time verification of an HMAC-SHA256 tag.
pub fn hmac_verify(secret: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}
