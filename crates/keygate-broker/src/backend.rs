//! Back-end collaborator contracts.
//!
//! A back-end is three collaborators: a [`KeyStore`] that owns key material,
//! an [`AuthorizationService`] that presents user verification, and a
//! [`Cipher`] that runs transforms over material the store hands out. The
//! broker depends only on these traits; which implementation is active is
//! decided once at startup.

use std::fmt;

use async_trait::async_trait;
use keygate_core::{
    AuthStrength, CryptoError, CryptoKeyOptions, LoadedKey, PromptOptions, SecretBuffer,
    SecureOperationRequest,
};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelSignal;
use crate::error::BrokerError;
use crate::gate::AuthorizedHandle;

// ---------------------------------------------------------------------------
// Protection tiers
// ---------------------------------------------------------------------------

/// Strength of hardware isolation a key receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectionTier {
    /// Dedicated secure element.
    StrongBox,
    /// Secure enclave coprocessor.
    SecureEnclave,
    /// Trusted execution environment on the main processor.
    TrustedEnvironment,
    /// No hardware isolation.
    Software,
}

impl ProtectionTier {
    /// The tier tried when this one is unavailable.
    #[must_use]
    pub const fn fallback(self) -> Option<Self> {
        match self {
            Self::StrongBox => Some(Self::TrustedEnvironment),
            Self::SecureEnclave | Self::TrustedEnvironment => Some(Self::Software),
            Self::Software => None,
        }
    }

    /// Label reported as a key's security level.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StrongBox => "StrongBox",
            Self::SecureEnclave => "Secure Enclave",
            Self::TrustedEnvironment => "TEE",
            Self::Software => "Software",
        }
    }
}

impl fmt::Display for ProtectionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Key store
// ---------------------------------------------------------------------------

/// What to create: the alias and the validated options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub key_id: String,
    pub options: CryptoKeyOptions,
}

impl KeySpec {
    pub fn new(key_id: impl Into<String>, options: CryptoKeyOptions) -> Self {
        Self {
            key_id: key_id.into(),
            options,
        }
    }
}

/// Persistent key storage.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Human-readable back-end name for logs.
    fn name(&self) -> &'static str;

    /// Best tier this store claims to offer. A claim, not a promise:
    /// [`KeyStore::generate`] may still reject it.
    fn strongest_tier(&self) -> ProtectionTier;

    /// Whether an alias is present. Advisory only; another caller may create
    /// or delete the alias before the next call.
    async fn contains_alias(&self, key_id: &str) -> Result<bool, BrokerError>;

    /// Create a key at `tier` if the alias is absent.
    ///
    /// Returns the tier the key actually received. Fails with
    /// [`BrokerError::TierUnavailable`] when `tier` cannot be provided and
    /// [`BrokerError::AlreadyExists`] when the alias is taken.
    async fn generate(&self, spec: &KeySpec, tier: ProtectionTier)
        -> Result<ProtectionTier, BrokerError>;

    /// Remove a key. `Ok(false)` when there was nothing to remove.
    async fn delete(&self, key_id: &str) -> Result<bool, BrokerError>;

    /// Load private or secret material. Consumes the authorization so it
    /// cannot serve a second retrieval.
    async fn retrieve(&self, key_id: &str, handle: AuthorizedHandle)
        -> Result<LoadedKey, BrokerError>;

    /// Load the public half of a key pair. Needs no authorization.
    async fn retrieve_public(&self, key_id: &str) -> Result<LoadedKey, BrokerError>;
}

// ---------------------------------------------------------------------------
// Authorization service
// ---------------------------------------------------------------------------

/// Platform state proving one successful verification, e.g. an unlocked
/// authentication context. Invalidated when the operation ends.
pub trait AuthorizationContext: Send + Sync {
    /// Release the platform state. Called exactly once.
    fn invalidate(&mut self);
}

/// Result of presenting user verification.
pub enum VerificationOutcome {
    Verified(Box<dyn AuthorizationContext>),
    /// Wrong biometric, too many attempts, or the user declined.
    Denied(String),
    /// Nothing to verify with (no enrolment, no hardware, disabled by policy).
    Unavailable(String),
    /// The platform dismissed the prompt in response to the signal.
    Cancelled,
    /// The platform call itself failed.
    Failed(String),
}

impl fmt::Debug for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified(_) => f.write_str("Verified(..)"),
            Self::Denied(reason) => f.debug_tuple("Denied").field(reason).finish(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Presents biometric or device-credential verification.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether verification at `strength` (or with the device credential,
    /// when `allow_fallback`) can be presented right now.
    async fn can_verify(&self, strength: AuthStrength, allow_fallback: bool) -> bool;

    /// Present verification and wait for the user. Implementations should
    /// dismiss their UI when `cancel` fires.
    async fn verify(&self, prompt: &PromptOptions, cancel: &CancelSignal) -> VerificationOutcome;

    /// Tear down an in-flight prompt whose future was abandoned.
    fn abandon(&self) {}
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// Output of an encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    pub output: Vec<u8>,
    /// Present for modes that take a nonce.
    pub iv: Option<Vec<u8>>,
}

/// Transforms over loaded key material.
pub trait Cipher: Send + Sync {
    /// Whether `request`'s cipher transformation can run here at all.
    /// Consulted before the gate, so an unusable request never prompts.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::UnsupportedTransformation` when it cannot.
    fn supports(&self, _request: &SecureOperationRequest) -> Result<(), CryptoError> {
        Ok(())
    }

    /// Encrypt `request.input_data`. AES-GCM output must follow the
    /// `ciphertext || tag` layout with a 12-byte IV.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] when the transform is unsupported or fails.
    fn encrypt(
        &self,
        key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<Ciphertext, CryptoError>;

    /// Decrypt `request.input_data` with `request.iv`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decryption` on an authentication failure.
    fn decrypt(
        &self,
        key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<SecretBuffer, CryptoError>;

    /// Sign `data` with the key's digest.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] when signing fails.
    fn sign(&self, key: &LoadedKey, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Check `signature` over `data`. A mismatch is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] when the check cannot run.
    fn verify(&self, key: &LoadedKey, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError>;

    /// Message authentication code over `data`.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] when the key cannot MAC.
    fn mac(&self, key: &LoadedKey, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
