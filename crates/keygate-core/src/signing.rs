//! Software signatures: ECDSA (P-256, P-384) and RSA PKCS#1 v1.5 via `ring`.
//!
//! The curve follows the key size and the hash follows the key's digest.
//! `ring` pairs each curve with one hash, so only P-256/SHA-256 and
//! P-384/SHA-384 are available for EC keys. RSA keys sign with SHA-256,
//! SHA-384 or SHA-512. RSA keys cannot be generated here; they arrive as
//! PKCS#8 from a key store.

use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey};

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use crate::policy::Digest;

/// Freshly generated EC key pair.
#[derive(Debug)]
pub struct EcKeyPair {
    pub pkcs8: SecretBuffer,
    /// Uncompressed SEC1 point.
    pub public_key: Vec<u8>,
}

fn ecdsa_signing(
    key_size_bits: u32,
    digest: Digest,
) -> Result<&'static signature::EcdsaSigningAlgorithm, CryptoError> {
    match (key_size_bits, digest) {
        (256, Digest::Sha256) => Ok(&signature::ECDSA_P256_SHA256_ASN1_SIGNING),
        (384, Digest::Sha384) => Ok(&signature::ECDSA_P384_SHA384_ASN1_SIGNING),
        _ => Err(unsupported_ec(key_size_bits, digest)),
    }
}

fn ecdsa_verification(
    key_size_bits: u32,
    digest: Digest,
) -> Result<&'static signature::EcdsaVerificationAlgorithm, CryptoError> {
    match (key_size_bits, digest) {
        (256, Digest::Sha256) => Ok(&signature::ECDSA_P256_SHA256_ASN1),
        (384, Digest::Sha384) => Ok(&signature::ECDSA_P384_SHA384_ASN1),
        _ => Err(unsupported_ec(key_size_bits, digest)),
    }
}

fn unsupported_ec(key_size_bits: u32, digest: Digest) -> CryptoError {
    CryptoError::UnsupportedTransformation(format!(
        "ECDSA with a {key_size_bits}-bit curve and {} is not available in software",
        digest.as_str()
    ))
}

fn rsa_padding(digest: Digest) -> Result<&'static dyn signature::RsaEncoding, CryptoError> {
    match digest {
        Digest::Sha256 => Ok(&signature::RSA_PKCS1_SHA256),
        Digest::Sha384 => Ok(&signature::RSA_PKCS1_SHA384),
        Digest::Sha512 => Ok(&signature::RSA_PKCS1_SHA512),
        other => Err(unsupported_rsa(other)),
    }
}

fn rsa_verification(digest: Digest) -> Result<&'static signature::RsaParameters, CryptoError> {
    match digest {
        Digest::Sha256 => Ok(&signature::RSA_PKCS1_2048_8192_SHA256),
        Digest::Sha384 => Ok(&signature::RSA_PKCS1_2048_8192_SHA384),
        Digest::Sha512 => Ok(&signature::RSA_PKCS1_2048_8192_SHA512),
        other => Err(unsupported_rsa(other)),
    }
}

fn unsupported_rsa(digest: Digest) -> CryptoError {
    CryptoError::UnsupportedTransformation(format!(
        "RSA PKCS#1 signatures with {} are not available in software",
        digest.as_str()
    ))
}

// ---------------------------------------------------------------------------
// ECDSA
// ---------------------------------------------------------------------------

/// Generate an EC key pair for the curve selected by `key_size_bits`.
///
/// # Errors
///
/// Returns `CryptoError::UnsupportedTransformation` for a curve/digest pair
/// `ring` cannot sign with, or `CryptoError::InvalidKeyMaterial` if
/// generation fails.
pub fn generate_ec(key_size_bits: u32, digest: Digest) -> Result<EcKeyPair, CryptoError> {
    let alg = ecdsa_signing(key_size_bits, digest)?;
    let rng = SystemRandom::new();
    let document = EcdsaKeyPair::generate_pkcs8(alg, &rng)
        .map_err(|_| CryptoError::InvalidKeyMaterial("EC key generation failed".into()))?;
    let pair = EcdsaKeyPair::from_pkcs8(alg, document.as_ref(), &rng)
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("generated EC key rejected: {e}")))?;
    Ok(EcKeyPair {
        pkcs8: SecretBuffer::new(document.as_ref()),
        public_key: pair.public_key().as_ref().to_vec(),
    })
}

/// Sign `message` with an EC private key (ASN.1 DER signature).
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a PKCS#8 document that does
/// not match the curve, or `CryptoError::Signature` if signing fails.
pub fn sign_ec(
    key_size_bits: u32,
    digest: Digest,
    pkcs8: &SecretBuffer,
    message: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let alg = ecdsa_signing(key_size_bits, digest)?;
    let rng = SystemRandom::new();
    let pair = EcdsaKeyPair::from_pkcs8(alg, pkcs8.expose(), &rng)
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("EC private key rejected: {e}")))?;
    let signature = pair
        .sign(&rng, message)
        .map_err(|_| CryptoError::Signature("ECDSA signing failed".into()))?;
    Ok(signature.as_ref().to_vec())
}

/// Check an ECDSA signature. A mismatch is `Ok(false)`, not an error.
///
/// # Errors
///
/// Returns `CryptoError::UnsupportedTransformation` for an unavailable
/// curve/digest pair.
pub fn verify_ec(
    key_size_bits: u32,
    digest: Digest,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let alg = ecdsa_verification(key_size_bits, digest)?;
    Ok(UnparsedPublicKey::new(alg, public_key)
        .verify(message, signature)
        .is_ok())
}

// ---------------------------------------------------------------------------
// RSA
// ---------------------------------------------------------------------------

/// Sign `message` with an RSA private key using PKCS#1 v1.5 padding.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a rejected key, or
/// `CryptoError::Signature` if signing fails.
pub fn sign_rsa(digest: Digest, pkcs8: &SecretBuffer, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let padding = rsa_padding(digest)?;
    let pair = RsaKeyPair::from_pkcs8(pkcs8.expose())
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("RSA private key rejected: {e}")))?;
    let mut signature = vec![0u8; pair.public().modulus_len()];
    pair.sign(padding, &SystemRandom::new(), message, &mut signature)
        .map_err(|_| CryptoError::Signature("RSA signing failed".into()))?;
    Ok(signature)
}

/// Check an RSA PKCS#1 v1.5 signature against a DER `RSAPublicKey`.
///
/// # Errors
///
/// Returns `CryptoError::UnsupportedTransformation` for an unavailable digest.
pub fn verify_rsa(
    digest: Digest,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let params = rsa_verification(digest)?;
    Ok(UnparsedPublicKey::new(params, public_key)
        .verify(message, signature)
        .is_ok())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p256_sign_verify_roundtrip() {
        let pair = generate_ec(256, Digest::Sha256).unwrap();
        assert_eq!(pair.public_key.len(), 65);
        let sig = sign_ec(256, Digest::Sha256, &pair.pkcs8, b"message").unwrap();
        assert!(verify_ec(256, Digest::Sha256, &pair.public_key, b"message", &sig).unwrap());
        assert!(!verify_ec(256, Digest::Sha256, &pair.public_key, b"other", &sig).unwrap());
    }

    #[test]
    fn p384_sign_verify_roundtrip() {
        let pair = generate_ec(384, Digest::Sha384).unwrap();
        assert_eq!(pair.public_key.len(), 97);
        let sig = sign_ec(384, Digest::Sha384, &pair.pkcs8, b"message").unwrap();
        assert!(verify_ec(384, Digest::Sha384, &pair.public_key, b"message", &sig).unwrap());
    }

    #[test]
    fn signature_from_other_key_does_not_verify() {
        let a = generate_ec(256, Digest::Sha256).unwrap();
        let b = generate_ec(256, Digest::Sha256).unwrap();
        let sig = sign_ec(256, Digest::Sha256, &a.pkcs8, b"message").unwrap();
        assert!(!verify_ec(256, Digest::Sha256, &b.public_key, b"message", &sig).unwrap());
    }

    #[test]
    fn mismatched_curve_and_digest_is_unsupported() {
        assert!(matches!(
            generate_ec(256, Digest::Sha512),
            Err(CryptoError::UnsupportedTransformation(_))
        ));
        assert!(matches!(
            generate_ec(521, Digest::Sha512),
            Err(CryptoError::UnsupportedTransformation(_))
        ));
    }

    #[test]
    fn rsa_rejects_weak_digests() {
        let key = SecretBuffer::new(&[0u8; 8]);
        assert!(matches!(
            sign_rsa(Digest::Sha1, &key, b"m"),
            Err(CryptoError::UnsupportedTransformation(_))
        ));
        assert!(matches!(
            verify_rsa(Digest::None, &[0u8; 8], b"m", b"s"),
            Err(CryptoError::UnsupportedTransformation(_))
        ));
    }

    #[test]
    fn rsa_rejects_garbage_key() {
        let key = SecretBuffer::new(&[0u8; 8]);
        assert!(matches!(
            sign_rsa(Digest::Sha256, &key, b"m"),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn rsa_garbage_signature_does_not_verify() {
        assert!(!verify_rsa(Digest::Sha256, &[0u8; 8], b"m", b"s").unwrap());
    }
}
