//! Key creation intent: algorithm, permitted operations and transformation.
//!
//! [`CryptoKeyOptions`] is what a caller asks for; it carries no behavior of
//! its own. The [`validation`](crate::validation) module decides whether a
//! given combination may reach a key store.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Algorithm / transformation enums
// ---------------------------------------------------------------------------

/// Key algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyAlgorithm {
    Aes,
    Rsa,
    Ec,
}

impl KeyAlgorithm {
    /// Canonical upper-case name used in transformation strings and messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aes => "AES",
            Self::Rsa => "RSA",
            Self::Ec => "EC",
        }
    }

    /// Whether the key is a public/private pair.
    #[must_use]
    pub const fn is_asymmetric(&self) -> bool {
        matches!(self, Self::Rsa | Self::Ec)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockMode {
    None,
    Cbc,
    Gcm,
    Ctr,
    Ecb,
}

impl BlockMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Cbc => "CBC",
            Self::Gcm => "GCM",
            Self::Ctr => "CTR",
            Self::Ecb => "ECB",
        }
    }
}

/// Encryption padding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Padding {
    None,
    Pkcs7,
    Pkcs1,
    Oaep,
}

impl Padding {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NoPadding",
            Self::Pkcs7 => "PKCS7Padding",
            Self::Pkcs1 => "PKCS1Padding",
            Self::Oaep => "OAEPPadding",
        }
    }
}

/// Message digest used by signatures (and OAEP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Digest {
    None,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl Digest {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }
}

/// Render the `ALGORITHM/MODE/PADDING` transformation string a platform
/// cipher provider expects (e.g. `AES/GCM/NoPadding`).
#[must_use]
pub fn transformation(algorithm: KeyAlgorithm, block_mode: BlockMode, padding: Padding) -> String {
    format!(
        "{}/{}/{}",
        algorithm.as_str(),
        block_mode.as_str(),
        padding.as_str()
    )
}

// ---------------------------------------------------------------------------
// Operation set
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Operations a key is created for.
    ///
    /// The set is fixed at creation time and becomes the key's purpose in the
    /// key store. An empty set never passes validation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CryptoOperations: u8 {
        const ENCRYPT = 1 << 0;
        const DECRYPT = 1 << 1;
        const SIGN = 1 << 2;
        const VERIFY = 1 << 3;
        const MAC = 1 << 4;
    }
}

impl CryptoOperations {
    /// Either direction of a cipher transform.
    pub const CIPHER: Self = Self::ENCRYPT.union(Self::DECRYPT);

    /// Either side of a signature.
    pub const SIGNATURE: Self = Self::SIGN.union(Self::VERIFY);
}

impl Default for CryptoOperations {
    fn default() -> Self {
        Self::CIPHER
    }
}

// ---------------------------------------------------------------------------
// Key options
// ---------------------------------------------------------------------------

/// Desired properties of a key about to be created.
///
/// Defaults describe an AES-256-GCM encryption key that requires user
/// authentication for every use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoKeyOptions {
    /// Algorithm family of the key.
    pub algorithm: KeyAlgorithm,
    /// Operations the key may perform. Must not be empty.
    pub operations: CryptoOperations,
    /// Key size in bits (AES key length, RSA modulus, EC curve size).
    pub key_size_bits: u32,
    /// Whether every private/secret use is gated behind user verification.
    pub require_user_authentication: bool,
    /// Block mode for symmetric (and RSA) transforms.
    pub block_mode: BlockMode,
    /// Encryption padding.
    pub padding: Padding,
    /// Digest for signatures.
    pub digest: Digest,
}

impl Default for CryptoKeyOptions {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgorithm::Aes,
            operations: CryptoOperations::CIPHER,
            key_size_bits: 256,
            require_user_authentication: true,
            block_mode: BlockMode::Gcm,
            padding: Padding::None,
            digest: Digest::Sha256,
        }
    }
}

impl CryptoKeyOptions {
    /// AES-GCM key of the given size for encrypt and decrypt.
    #[must_use]
    pub fn aes_gcm(key_size_bits: u32) -> Self {
        Self {
            key_size_bits,
            ..Self::default()
        }
    }

    /// EC signing key of the given curve size for sign and verify.
    #[must_use]
    pub fn ec_signing(key_size_bits: u32) -> Self {
        Self {
            algorithm: KeyAlgorithm::Ec,
            operations: CryptoOperations::SIGNATURE,
            key_size_bits,
            block_mode: BlockMode::None,
            padding: Padding::None,
            ..Self::default()
        }
    }

    /// RSA signing key of the given modulus size for sign and verify.
    #[must_use]
    pub fn rsa_signing(key_size_bits: u32) -> Self {
        Self {
            algorithm: KeyAlgorithm::Rsa,
            operations: CryptoOperations::SIGNATURE,
            key_size_bits,
            block_mode: BlockMode::None,
            padding: Padding::None,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
