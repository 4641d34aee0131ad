//! Caller requests for protected cryptographic operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::policy::{BlockMode, KeyAlgorithm, Padding};
use crate::result::{FailureKind, SecureOperationResponse};
use crate::validation::BLANK_KEY_ID;

/// Required strength of the user-presence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthStrength {
    /// Class 3 biometrics (or equivalent hardware-backed verification).
    #[default]
    Strong,
    /// Class 2 biometrics; acceptable when the key permits it.
    Weak,
}

/// Text and policy shown to the user when an operation needs verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    pub title: String,
    pub subtitle: String,
    pub negative_text: String,
    /// Longer explanation; some platforms show only this.
    pub description: Option<String>,
    /// Accept the device PIN/password when biometrics fail or are absent.
    pub allow_password_fallback: bool,
    pub auth_strength: AuthStrength,
}

impl PromptOptions {
    /// The human-readable reason handed to the platform verifier.
    ///
    /// Falls back from description to title, then to a generic phrase, so a
    /// platform that requires a non-empty reason always gets one.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self.description.as_deref() {
            Some(description) if !description.trim().is_empty() => description,
            _ if !self.title.trim().is_empty() => &self.title,
            _ => "Authenticate to use a protected key",
        }
    }
}

/// A request to run one cryptographic operation against a stored key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureOperationRequest {
    pub key_id: String,
    pub input_data: Vec<u8>,
    pub algorithm: KeyAlgorithm,
    pub block_mode: BlockMode,
    pub padding: Padding,
    /// Nonce for decryption. Ignored on encryption: a fresh one is generated.
    pub iv: Option<Vec<u8>>,
    /// Signature to check; only read by verify.
    pub signature: Option<Vec<u8>>,
    pub prompt: PromptOptions,
}

impl SecureOperationRequest {
    /// An AES-GCM request with default prompt options.
    pub fn new(key_id: impl Into<String>, input_data: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: key_id.into(),
            input_data: input_data.into(),
            algorithm: KeyAlgorithm::Aes,
            block_mode: BlockMode::Gcm,
            padding: Padding::None,
            iv: None,
            signature: None,
            prompt: PromptOptions::default(),
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_transformation(mut self, block_mode: BlockMode, padding: Padding) -> Self {
        self.block_mode = block_mode;
        self.padding = padding;
        self
    }

    #[must_use]
    pub fn with_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.iv = Some(iv.into());
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<Vec<u8>>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptOptions) -> Self {
        self.prompt = prompt;
        self
    }

    /// Checks shared by every operation, run before any prompt or key access.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidRequest` failure response for a blank key id or
    /// empty input.
    pub fn check(&self) -> Result<(), SecureOperationResponse> {
        if self.key_id.trim().is_empty() {
            return Err(SecureOperationResponse::failure(
                FailureKind::InvalidRequest,
                BLANK_KEY_ID,
            ));
        }
        if self.input_data.is_empty() {
            return Err(SecureOperationResponse::failure(
                FailureKind::InvalidRequest,
                "Input data cannot be null or empty.",
            ));
        }
        Ok(())
    }
}

impl Drop for SecureOperationRequest {
    fn drop(&mut self) {
        self.input_data.zeroize();
    }
}

impl fmt::Debug for SecureOperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureOperationRequest")
            .field("key_id", &self.key_id)
            .field("input_len", &self.input_data.len())
            .field("algorithm", &self.algorithm)
            .field("block_mode", &self.block_mode)
            .field("padding", &self.padding)
            .field("iv_len", &self.iv.as_ref().map(Vec::len))
            .field("has_signature", &self.signature.is_some())
            .field("prompt", &self.prompt)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
