//! AES-GCM wire codec shared by every back-end.
//!
//! Layout: the IV travels separately and is exactly [`IV_LEN`] bytes; the
//! payload is `ciphertext || tag`, where the tag is the final [`TAG_LEN`]
//! bytes and the ciphertext has the plaintext's length.
//!
//! - [`seal`] / [`open`]: software AES-GCM (128- or 256-bit keys) via `ring`
//! - [`check_open_input`]: decrypt-side framing checks, run before any prompt
//! - [`check_sealed_layout`]: verify a back-end's encrypt output
//! - [`split_tag`] / [`join_tag`]: move between the payload and its parts

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBuffer;

/// AES-GCM nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Output of one AES-GCM encryption.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    /// `ciphertext || tag`.
    pub payload: Vec<u8>,
    /// Fresh random nonce for this payload.
    pub iv: [u8; IV_LEN],
}

fn algorithm_for(key: &[u8]) -> Result<&'static aead::Algorithm, CryptoError> {
    match key.len() {
        16 => Ok(&aead::AES_128_GCM),
        32 => Ok(&aead::AES_256_GCM),
        other => Err(CryptoError::InvalidKeyMaterial(format!(
            "AES-GCM key must be 16 or 32 bytes, got {other}"
        ))),
    }
}

fn cipher_for(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    let unbound = aead::UnboundKey::new(algorithm_for(key)?, key)
        .map_err(|_| CryptoError::InvalidKeyMaterial("failed to create AES-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Check decrypt input before anything touches a key or prompts the user.
///
/// # Errors
///
/// Returns `CryptoError::Framing` if the IV is missing, empty or not
/// [`IV_LEN`] bytes, or if `input_len` cannot hold a tag.
pub fn check_open_input(iv: Option<&[u8]>, input_len: usize) -> Result<(), CryptoError> {
    let iv = match iv {
        Some(iv) if !iv.is_empty() => iv,
        _ => {
            return Err(CryptoError::Framing(
                "IV is required for AES-GCM decryption.".into(),
            ))
        }
    };
    if iv.len() != IV_LEN {
        return Err(CryptoError::Framing(format!(
            "IV must be {IV_LEN} bytes for AES-GCM decryption, got {}.",
            iv.len()
        )));
    }
    if input_len < TAG_LEN {
        return Err(CryptoError::Framing(
            "Input data is too short for AES-GCM decryption.".into(),
        ));
    }
    Ok(())
}

/// Check that `payload`/`iv` produced for `plaintext_len` bytes of input has
/// the canonical layout.
///
/// # Errors
///
/// Returns `CryptoError::Framing` on a missing or wrong-size IV, or a payload
/// whose length is not `plaintext_len + TAG_LEN`.
pub fn check_sealed_layout(
    plaintext_len: usize,
    payload: &[u8],
    iv: Option<&[u8]>,
) -> Result<(), CryptoError> {
    match iv {
        Some(iv) if iv.len() == IV_LEN => {}
        Some(iv) => {
            return Err(CryptoError::Framing(format!(
                "back-end produced a {}-byte IV, expected {IV_LEN}",
                iv.len()
            )))
        }
        None => return Err(CryptoError::Framing("back-end produced no IV".into())),
    }
    let expected = plaintext_len
        .checked_add(TAG_LEN)
        .ok_or_else(|| CryptoError::Framing("plaintext length overflow".into()))?;
    if payload.len() != expected {
        return Err(CryptoError::Framing(format!(
            "back-end produced {} bytes, expected {expected}",
            payload.len()
        )));
    }
    Ok(())
}

/// Split `ciphertext || tag` into its two parts.
///
/// # Errors
///
/// Returns `CryptoError::Framing` if `payload` is shorter than [`TAG_LEN`].
pub fn split_tag(payload: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    let ct_len = payload.len().checked_sub(TAG_LEN).ok_or_else(|| {
        CryptoError::Framing("Input data is too short for AES-GCM decryption.".into())
    })?;
    Ok(payload.split_at(ct_len))
}

/// Assemble `ciphertext || tag` from a back-end that reports them apart.
///
/// # Errors
///
/// Returns `CryptoError::Framing` if `tag` is not [`TAG_LEN`] bytes.
pub fn join_tag(ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if tag.len() != TAG_LEN {
        return Err(CryptoError::Framing(format!(
            "authentication tag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }
    let mut payload = Vec::with_capacity(ciphertext.len().saturating_add(TAG_LEN));
    payload.extend_from_slice(ciphertext);
    payload.extend_from_slice(tag);
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Software cipher
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under `key` with a fresh random IV.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a key that is not 16 or 32
/// bytes, `CryptoError::SecureMemory` if the CSPRNG fails, and
/// `CryptoError::Encryption` if sealing fails.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Sealed, CryptoError> {
    let cipher = cipher_for(key)?;

    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(iv);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = cipher.seal_in_place_separate_tag(nonce, aead::Aad::empty(), &mut in_out) else {
        in_out.zeroize();
        return Err(CryptoError::Encryption("AES-GCM encryption failed".into()));
    };
    in_out.extend_from_slice(tag.as_ref());

    Ok(Sealed {
        payload: in_out,
        iv,
    })
}

/// Decrypt and authenticate `payload` (`ciphertext || tag`) under `key`.
///
/// # Errors
///
/// Returns `CryptoError::Framing` for a bad IV or short payload,
/// `CryptoError::InvalidKeyMaterial` for a bad key, and
/// `CryptoError::Decryption` when the tag does not verify.
pub fn open(key: &[u8], iv: Option<&[u8]>, payload: &[u8]) -> Result<SecretBuffer, CryptoError> {
    check_open_input(iv, payload.len())?;
    let mut nonce_bytes = [0u8; IV_LEN];
    if let Some(iv) = iv {
        nonce_bytes.copy_from_slice(iv);
    }
    let cipher = cipher_for(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = payload.to_vec();
    let opened = cipher
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map(|plaintext| SecretBuffer::new(plaintext));
    in_out.zeroize();
    opened.map_err(|_| CryptoError::Decryption)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
