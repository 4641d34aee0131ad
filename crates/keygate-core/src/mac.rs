//! HMAC-SHA256 over a key's secret material.

use ring::hmac;

use crate::error::CryptoError;
use crate::memory::SecretBuffer;

/// HMAC-SHA256 output length in bytes.
pub const MAC_LEN: usize = 32;

/// Compute HMAC-SHA256 of `data`.
///
/// # Errors
///
/// Returns `CryptoError::Mac` for an empty key.
pub fn compute(key: &SecretBuffer, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.is_empty() {
        return Err(CryptoError::Mac("MAC key is empty".into()));
    }
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.expose());
    Ok(hmac::sign(&key, data).as_ref().to_vec())
}

/// Constant-time check of `tag` against HMAC-SHA256 of `data`.
#[must_use]
pub fn verify(key: &SecretBuffer, data: &[u8], tag: &[u8]) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.expose());
    hmac::verify(&key, data, tag).is_ok()
}
