//! Cryptographic error types for `keygate-core`.

use thiserror::Error;

/// Errors produced by the codec and the software cipher primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption could not be performed (bad key length, cipher failure).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed: ciphertext tampered, wrong key or wrong IV.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Input does not respect the AES-GCM wire layout (IV length, tag length).
    #[error("invalid AES-GCM framing: {0}")]
    Framing(String),

    /// Signature creation or verification failure.
    #[error("signature error: {0}")]
    Signature(String),

    /// Message authentication code failure.
    #[error("MAC error: {0}")]
    Mac(String),

    /// Invalid key material (wrong length, corrupted bytes, wrong algorithm).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The algorithm/mode/padding/digest combination cannot be executed here.
    #[error("unsupported transformation: {0}")]
    UnsupportedTransformation(String),

    /// Secure memory allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
