//! Secure operation orchestrator.
//!
//! [`KeyBroker`] is the public face of the crate. Every operation follows the
//! same order: cancellation check, request checks, then (for protected
//! operations) the authorization gate, key retrieval, and the cipher. Failures
//! come back as failure results; only cancellation is reported as `Err`.

use std::sync::Arc;

use keygate_core::{
    gcm, transformation, validate, BlockMode, CryptoError, CryptoKeyOptions, CryptoOperations,
    FailureKind, KeyAlgorithm, KeyOperationResult, LoadedKey, SecureOperationRequest,
    SecureOperationResponse, ValidationOutcome, BLANK_KEY_ID,
};
use tracing::{debug, info, warn};

use crate::backend::{AuthorizationService, Cipher, KeySpec, KeyStore, ProtectionTier};
use crate::cancel::CancelSignal;
use crate::error::{BrokerError, OperationCancelled};
use crate::gate::{AuthorizationGate, AuthorizedHandle, GateOutcome};
use crate::settings::BrokerSettings;

const MISSING_SIGNATURE: &str = "Signature cannot be null or empty.";
const SIGNATURE_MISMATCH: &str = "Signature verification failed.";
const EC_NO_CIPHER: &str =
    "EC keys cannot be used for encrypt/decrypt operations. Use RSA or AES instead.";
const AES_NO_SIGNATURE: &str =
    "AES keys cannot be used for sign/verify operations. Use RSA or EC instead.";
const MAC_NEEDS_AES: &str = "MAC operations require an AES key.";

/// Why an operation stopped early.
enum Stop {
    Cancelled,
    Rejected(SecureOperationResponse),
    Failed(BrokerError),
}

impl From<BrokerError> for Stop {
    fn from(err: BrokerError) -> Self {
        Self::Failed(err)
    }
}

impl From<CryptoError> for Stop {
    fn from(err: CryptoError) -> Self {
        Self::Failed(BrokerError::Crypto(err))
    }
}

type Step<T> = Result<T, Stop>;

fn finish(
    operation: &'static str,
    key_id: &str,
    result: Step<SecureOperationResponse>,
) -> Result<SecureOperationResponse, OperationCancelled> {
    match result {
        Ok(response) => {
            debug!(operation, key_id = %key_id, "operation succeeded");
            Ok(response)
        }
        Err(Stop::Rejected(response)) => {
            debug!(operation, key_id = %key_id, "request rejected");
            Ok(response)
        }
        Err(Stop::Failed(err)) => {
            warn!(operation, key_id = %key_id, kind = ?err.kind(), "operation failed: {err}");
            Ok(err.into_response())
        }
        Err(Stop::Cancelled) => {
            info!(operation, key_id = %key_id, "operation cancelled");
            Err(OperationCancelled)
        }
    }
}

fn begin(request: &SecureOperationRequest, cancel: &CancelSignal) -> Step<()> {
    if cancel.is_cancelled() {
        return Err(Stop::Cancelled);
    }
    request.check().map_err(Stop::Rejected)
}

/// The loaded key must match the request's algorithm and have been created
/// for `needed`. Cipher operations must also use the block mode and padding
/// the key was created with.
fn check_purpose(
    key: &LoadedKey,
    request: &SecureOperationRequest,
    needed: CryptoOperations,
    operation: &str,
) -> Result<(), BrokerError> {
    let algorithm = request.algorithm;
    if key.algorithm() != algorithm {
        return Err(BrokerError::Policy(format!(
            "Key '{}' is an {} key; the request asked for {algorithm}.",
            key.key_id,
            key.algorithm()
        )));
    }
    if !key.permits(needed) {
        return Err(BrokerError::Policy(format!(
            "Key '{}' was not created for {operation} operations.",
            key.key_id
        )));
    }
    let profile = &key.profile;
    if needed.intersects(CryptoOperations::CIPHER)
        && (profile.block_mode != request.block_mode || profile.padding != request.padding)
    {
        return Err(BrokerError::Policy(format!(
            "Key '{}' was created for {}; the request asked for {}.",
            key.key_id,
            transformation(algorithm, profile.block_mode, profile.padding),
            transformation(algorithm, request.block_mode, request.padding)
        )));
    }
    Ok(())
}

fn creation_note(requested: ProtectionTier, achieved: ProtectionTier) -> String {
    let how = if requested == achieved {
        "achieved"
    } else {
        "fell back"
    };
    format!("Key created with {achieved} security ({requested} {how})")
}

// ---------------------------------------------------------------------------
// KeyBroker
// ---------------------------------------------------------------------------

/// Mediates every key operation through one back-end.
pub struct KeyBroker {
    store: Arc<dyn KeyStore>,
    authorizer: Arc<dyn AuthorizationService>,
    cipher: Arc<dyn Cipher>,
    settings: BrokerSettings,
}

impl KeyBroker {
    /// A broker over the given back-end with default settings.
    pub fn new(
        store: Arc<dyn KeyStore>,
        authorizer: Arc<dyn AuthorizationService>,
        cipher: Arc<dyn Cipher>,
    ) -> Self {
        Self {
            store,
            authorizer,
            cipher,
            settings: BrokerSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: BrokerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Name of the active key store.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    // ── Key lifecycle ──────────────────────────────────────────────

    /// Validate `options` and create a key under `key_id`.
    ///
    /// Asks for the preferred tier (or the store's strongest) and, when the
    /// store reports that tier unavailable, retries once at the next tier.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` was already set.
    pub async fn create_key(
        &self,
        key_id: &str,
        options: &CryptoKeyOptions,
        cancel: &CancelSignal,
    ) -> Result<KeyOperationResult, OperationCancelled> {
        if cancel.is_cancelled() {
            return Err(OperationCancelled);
        }
        if let ValidationOutcome::Invalid(reason) = validate(key_id, Some(options)) {
            warn!(key_id = %key_id, "key options rejected: {reason}");
            return Ok(KeyOperationResult::failure(
                FailureKind::PolicyViolation,
                reason,
            ));
        }
        Ok(self.generate(key_id, options).await.unwrap_or_else(|err| {
            warn!(key_id = %key_id, kind = ?err.kind(), "key creation failed: {err}");
            err.into_key_result()
        }))
    }

    async fn generate(
        &self,
        key_id: &str,
        options: &CryptoKeyOptions,
    ) -> Result<KeyOperationResult, BrokerError> {
        if self.store.contains_alias(key_id).await? {
            return Err(BrokerError::AlreadyExists(key_id.to_owned()));
        }

        let spec = KeySpec::new(key_id, options.clone());
        let requested = self
            .settings
            .preferred_tier
            .unwrap_or_else(|| self.store.strongest_tier());

        let achieved = match self.store.generate(&spec, requested).await {
            Ok(tier) => tier,
            Err(BrokerError::TierUnavailable(tier)) if self.settings.allow_tier_fallback => {
                let Some(next) = tier.fallback() else {
                    return Err(BrokerError::TierUnavailable(tier));
                };
                warn!(key_id = %key_id, from = %tier, to = %next, "protection tier unavailable, retrying once");
                self.store.generate(&spec, next).await?
            }
            Err(err) => return Err(err),
        };

        info!(key_id = %key_id, tier = %achieved, backend = self.store.name(), "key created");
        Ok(KeyOperationResult::success(
            Some(achieved.label().to_owned()),
            Some(creation_note(requested, achieved)),
        ))
    }

    /// Delete `key_id`. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` was already set.
    pub async fn delete_key(
        &self,
        key_id: &str,
        cancel: &CancelSignal,
    ) -> Result<KeyOperationResult, OperationCancelled> {
        if cancel.is_cancelled() {
            return Err(OperationCancelled);
        }
        if key_id.trim().is_empty() {
            return Ok(KeyOperationResult::failure(
                FailureKind::InvalidRequest,
                BLANK_KEY_ID,
            ));
        }
        Ok(match self.store.delete(key_id).await {
            Ok(true) => {
                info!(key_id = %key_id, "key deleted");
                KeyOperationResult::success_with_info(format!(
                    "Key '{key_id}' successfully deleted."
                ))
            }
            Ok(false) => KeyOperationResult::success_with_info(format!(
                "Key '{key_id}' was already deleted or never existed."
            )),
            Err(err) => {
                warn!(key_id = %key_id, "key deletion failed: {err}");
                err.into_key_result()
            }
        })
    }

    /// Whether `key_id` exists. Absence is a failure result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` was already set.
    pub async fn key_exists(
        &self,
        key_id: &str,
        cancel: &CancelSignal,
    ) -> Result<KeyOperationResult, OperationCancelled> {
        if cancel.is_cancelled() {
            return Err(OperationCancelled);
        }
        if key_id.trim().is_empty() {
            return Ok(KeyOperationResult::failure(
                FailureKind::InvalidRequest,
                BLANK_KEY_ID,
            ));
        }
        Ok(match self.store.contains_alias(key_id).await {
            Ok(true) => KeyOperationResult::success_with_info(format!("Key '{key_id}' exists.")),
            Ok(false) => BrokerError::KeyNotFound(key_id.to_owned()).into_key_result(),
            Err(err) => err.into_key_result(),
        })
    }

    // ── Cryptographic operations ───────────────────────────────────

    /// Encrypt `request.input_data`.
    ///
    /// AES always passes the gate and returns `ciphertext || tag` plus a
    /// fresh IV. RSA encrypts with the public key and never prompts.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` fires before the operation
    /// completes.
    pub async fn encrypt(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Result<SecureOperationResponse, OperationCancelled> {
        finish("encrypt", &request.key_id, self.run_encrypt(request, cancel).await)
    }

    async fn run_encrypt(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Step<SecureOperationResponse> {
        begin(request, cancel)?;
        match request.algorithm {
            KeyAlgorithm::Aes => {
                self.cipher.supports(request)?;
                let key = self
                    .unlock(request, cancel, CryptoOperations::ENCRYPT, "encrypt")
                    .await?;
                let sealed = self.cipher.encrypt(&key, request)?;
                drop(key);
                if request.block_mode == BlockMode::Gcm {
                    gcm::check_sealed_layout(
                        request.input_data.len(),
                        &sealed.output,
                        sealed.iv.as_deref(),
                    )
                    .map_err(|e| CryptoError::Encryption(e.to_string()))?;
                }
                Ok(SecureOperationResponse::success(
                    &sealed.output,
                    sealed.iv.as_deref(),
                ))
            }
            KeyAlgorithm::Rsa => {
                self.cipher.supports(request)?;
                let key = self
                    .load_public(request, CryptoOperations::ENCRYPT, "encrypt")
                    .await?;
                let sealed = self.cipher.encrypt(&key, request)?;
                Ok(SecureOperationResponse::success(
                    &sealed.output,
                    sealed.iv.as_deref(),
                ))
            }
            KeyAlgorithm::Ec => Err(BrokerError::Policy(EC_NO_CIPHER.into()).into()),
        }
    }

    /// Decrypt `request.input_data`. Always passes the gate.
    ///
    /// For AES-GCM the IV and tag framing are checked before prompting.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` fires before the operation
    /// completes.
    pub async fn decrypt(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Result<SecureOperationResponse, OperationCancelled> {
        finish("decrypt", &request.key_id, self.run_decrypt(request, cancel).await)
    }

    async fn run_decrypt(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Step<SecureOperationResponse> {
        begin(request, cancel)?;
        match request.algorithm {
            KeyAlgorithm::Aes | KeyAlgorithm::Rsa => {
                if request.algorithm == KeyAlgorithm::Aes && request.block_mode == BlockMode::Gcm {
                    gcm::check_open_input(request.iv.as_deref(), request.input_data.len())?;
                }
                self.cipher.supports(request)?;
                let key = self
                    .unlock(request, cancel, CryptoOperations::DECRYPT, "decrypt")
                    .await?;
                let plaintext = self.cipher.decrypt(&key, request)?;
                Ok(SecureOperationResponse::success(plaintext.expose(), None))
            }
            KeyAlgorithm::Ec => Err(BrokerError::Policy(EC_NO_CIPHER.into()).into()),
        }
    }

    /// Sign `request.input_data` with the private key. Always passes the gate.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` fires before the operation
    /// completes.
    pub async fn sign(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Result<SecureOperationResponse, OperationCancelled> {
        finish("sign", &request.key_id, self.run_sign(request, cancel).await)
    }

    async fn run_sign(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Step<SecureOperationResponse> {
        begin(request, cancel)?;
        if request.algorithm == KeyAlgorithm::Aes {
            return Err(BrokerError::Policy(AES_NO_SIGNATURE.into()).into());
        }
        let key = self
            .unlock(request, cancel, CryptoOperations::SIGN, "sign")
            .await?;
        let signature = self.cipher.sign(&key, &request.input_data)?;
        Ok(SecureOperationResponse::success(&signature, None))
    }

    /// Check `request.signature` over `request.input_data` with the public
    /// key. Never prompts. A valid signature yields an empty success.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` was already set.
    pub async fn verify(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Result<SecureOperationResponse, OperationCancelled> {
        finish("verify", &request.key_id, self.run_verify(request, cancel).await)
    }

    async fn run_verify(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Step<SecureOperationResponse> {
        begin(request, cancel)?;
        let signature = match request.signature.as_deref() {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Err(BrokerError::InvalidRequest(MISSING_SIGNATURE.into()).into()),
        };
        if request.algorithm == KeyAlgorithm::Aes {
            return Err(BrokerError::Policy(AES_NO_SIGNATURE.into()).into());
        }
        let key = self
            .load_public(request, CryptoOperations::VERIFY, "verify")
            .await?;
        if self.cipher.verify(&key, &request.input_data, signature)? {
            Ok(SecureOperationResponse::success(&[], None))
        } else {
            Err(CryptoError::Signature(SIGNATURE_MISMATCH.into()).into())
        }
    }

    /// HMAC-SHA256 of `request.input_data` with an AES key's secret. Always
    /// passes the gate.
    ///
    /// # Errors
    ///
    /// Returns [`OperationCancelled`] if `cancel` fires before the operation
    /// completes.
    pub async fn mac(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Result<SecureOperationResponse, OperationCancelled> {
        finish("mac", &request.key_id, self.run_mac(request, cancel).await)
    }

    async fn run_mac(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Step<SecureOperationResponse> {
        begin(request, cancel)?;
        if request.algorithm != KeyAlgorithm::Aes {
            return Err(BrokerError::Policy(MAC_NEEDS_AES.into()).into());
        }
        let key = self
            .unlock(request, cancel, CryptoOperations::MAC, "MAC")
            .await?;
        let tag = self.cipher.mac(&key, &request.input_data)?;
        Ok(SecureOperationResponse::success(&tag, None))
    }

    // ── Shared steps ───────────────────────────────────────────────

    async fn ensure_exists(&self, key_id: &str) -> Step<()> {
        if self.store.contains_alias(key_id).await? {
            Ok(())
        } else {
            Err(BrokerError::KeyNotFound(key_id.to_owned()).into())
        }
    }

    async fn authorize(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
    ) -> Step<AuthorizedHandle> {
        let prompt = self.settings.default_prompt.apply(&request.prompt);
        let mut gate =
            AuthorizationGate::new(self.authorizer.as_ref(), self.settings.prompt_timeout());
        match gate.authorize(&request.key_id, &prompt, cancel).await {
            GateOutcome::Authorized(handle) => Ok(handle),
            GateOutcome::Cancelled => Err(Stop::Cancelled),
            GateOutcome::Denied(reason) => Err(BrokerError::Denied(reason).into()),
            GateOutcome::Unavailable(reason) => {
                Err(BrokerError::VerificationUnavailable(reason).into())
            }
            GateOutcome::Error(reason) => Err(BrokerError::Verification(reason).into()),
        }
    }

    /// Gate, then load private or secret material for one operation.
    async fn unlock(
        &self,
        request: &SecureOperationRequest,
        cancel: &CancelSignal,
        needed: CryptoOperations,
        operation: &str,
    ) -> Step<LoadedKey> {
        self.ensure_exists(&request.key_id).await?;
        let handle = self.authorize(request, cancel).await?;
        let key = self.store.retrieve(&request.key_id, handle).await?;
        check_purpose(&key, request, needed, operation)?;
        Ok(key)
    }

    async fn load_public(
        &self,
        request: &SecureOperationRequest,
        needed: CryptoOperations,
        operation: &str,
    ) -> Step<LoadedKey> {
        self.ensure_exists(&request.key_id).await?;
        let key = self.store.retrieve_public(&request.key_id).await?;
        check_purpose(&key, request, needed, operation)?;
        Ok(key)
    }
}
