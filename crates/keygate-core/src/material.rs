//! Key material as handed out by a key store for a single operation.

use crate::memory::SecretBuffer;
use crate::policy::{CryptoKeyOptions, CryptoOperations, KeyAlgorithm};

/// Raw material behind a key.
///
/// Secret variants hold [`SecretBuffer`]s, so dropping the value wipes the
/// bytes and `Debug` never prints them.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// Symmetric key bytes (AES, also used as the HMAC key).
    Secret(SecretBuffer),
    /// Private half of a key pair, PKCS#8 encoded.
    Private {
        pkcs8: SecretBuffer,
        public_key: Vec<u8>,
    },
    /// Public half of a key pair, in the form the verifier expects
    /// (uncompressed point for EC, DER `RSAPublicKey` for RSA).
    Public(Vec<u8>),
}

impl KeyMaterial {
    /// Public key bytes, when this material carries them.
    #[must_use]
    pub fn public_key(&self) -> Option<&[u8]> {
        match self {
            Self::Secret(_) => None,
            Self::Private { public_key, .. } => Some(public_key),
            Self::Public(public_key) => Some(public_key),
        }
    }

    /// Whether this material can perform private or secret-key operations.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_) | Self::Private { .. })
    }
}

/// A key loaded for exactly one operation: the options it was created with
/// and its material. Dropped as soon as the operation ends.
#[derive(Debug, Clone)]
pub struct LoadedKey {
    pub key_id: String,
    pub profile: CryptoKeyOptions,
    pub material: KeyMaterial,
}

impl LoadedKey {
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.profile.algorithm
    }

    /// Whether the key was created for every operation in `operations`.
    #[must_use]
    pub fn permits(&self, operations: CryptoOperations) -> bool {
        self.profile.operations.contains(operations)
    }
}
