//! Test doubles for back-end collaborators.

#![allow(dead_code, clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::collections::HashMap;
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keygate_broker::{
    AuthorizationContext, AuthorizationService, AuthorizedHandle, BrokerError, CancelSignal,
    CancelSource, Cipher, Ciphertext, KeySpec, KeyStore, ProtectionTier, VerificationOutcome,
};
use keygate_core::{
    AuthStrength, CryptoError, CryptoKeyOptions, KeyMaterial, LoadedKey, PromptOptions,
    SecretBuffer, SecureOperationRequest,
};

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

struct CountedContext(Arc<AtomicUsize>);

impl AuthorizationContext for CountedContext {
    fn invalidate(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// What the fake platform does when asked to verify.
pub enum Script {
    Approve,
    Deny,
    Fail,
    /// The platform reports its own cancellation.
    ReportCancelled,
    /// Never answers; only the signal or a timeout ends the prompt.
    Hang,
    /// Cancels the given source, then approves anyway.
    CancelThenApprove(CancelSource),
}

pub struct ScriptedAuthorizer {
    script: Script,
    available: bool,
    pub prompts: AtomicUsize,
    pub abandons: AtomicUsize,
    pub invalidations: Arc<AtomicUsize>,
    pub last_prompt: Mutex<Option<PromptOptions>>,
}

impl ScriptedAuthorizer {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            available: true,
            prompts: AtomicUsize::new(0),
            abandons: AtomicUsize::new(0),
            invalidations: Arc::new(AtomicUsize::new(0)),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            script: Script::Approve,
            available: false,
            prompts: AtomicUsize::new(0),
            abandons: AtomicUsize::new(0),
            invalidations: Arc::new(AtomicUsize::new(0)),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn abandons(&self) -> usize {
        self.abandons.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn verified(&self) -> VerificationOutcome {
        VerificationOutcome::Verified(Box::new(CountedContext(Arc::clone(&self.invalidations))))
    }
}

#[async_trait]
impl AuthorizationService for ScriptedAuthorizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn can_verify(&self, _strength: AuthStrength, _allow_fallback: bool) -> bool {
        self.available
    }

    async fn verify(&self, prompt: &PromptOptions, _cancel: &CancelSignal) -> VerificationOutcome {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        match &self.script {
            Script::Approve => self.verified(),
            Script::Deny => VerificationOutcome::Denied("Biometric not recognized.".into()),
            Script::Fail => VerificationOutcome::Failed("Biometric sensor error.".into()),
            Script::ReportCancelled => VerificationOutcome::Cancelled,
            Script::Hang => future::pending().await,
            Script::CancelThenApprove(source) => {
                source.cancel();
                self.verified()
            }
        }
    }

    fn abandon(&self) {
        self.abandons.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Key store
// ---------------------------------------------------------------------------

/// Scriptable in-memory key store that records what it was asked to do.
pub struct FakeKeyStore {
    keys: Mutex<HashMap<String, LoadedKey>>,
    strongest: ProtectionTier,
    supported: Vec<ProtectionTier>,
    /// Report every alias as absent, as a racing caller would observe.
    hide_aliases: bool,
    pub attempts: Mutex<Vec<ProtectionTier>>,
    pub retrievals: AtomicUsize,
    pub public_retrievals: AtomicUsize,
}

impl FakeKeyStore {
    pub fn new(strongest: ProtectionTier, supported: &[ProtectionTier]) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            strongest,
            supported: supported.to_vec(),
            hide_aliases: false,
            attempts: Mutex::new(Vec::new()),
            retrievals: AtomicUsize::new(0),
            public_retrievals: AtomicUsize::new(0),
        }
    }

    pub fn software() -> Self {
        Self::new(ProtectionTier::Software, &[ProtectionTier::Software])
    }

    #[must_use]
    pub fn hiding_aliases(mut self) -> Self {
        self.hide_aliases = true;
        self
    }

    pub fn insert(&self, key_id: &str, profile: CryptoKeyOptions, material: KeyMaterial) {
        self.keys.lock().unwrap().insert(
            key_id.to_owned(),
            LoadedKey {
                key_id: key_id.to_owned(),
                profile,
                material,
            },
        );
    }

    pub fn attempts(&self) -> Vec<ProtectionTier> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    pub fn public_retrievals(&self) -> usize {
        self.public_retrievals.load(Ordering::SeqCst)
    }
}

/// Material standing in for a key pair held by hardware.
pub fn opaque_pair() -> KeyMaterial {
    KeyMaterial::Private {
        pkcs8: SecretBuffer::new(b"opaque private key"),
        public_key: b"opaque public key".to_vec(),
    }
}

#[async_trait]
impl KeyStore for FakeKeyStore {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn strongest_tier(&self) -> ProtectionTier {
        self.strongest
    }

    async fn contains_alias(&self, key_id: &str) -> Result<bool, BrokerError> {
        Ok(!self.hide_aliases && self.keys.lock().unwrap().contains_key(key_id))
    }

    async fn generate(
        &self,
        spec: &KeySpec,
        tier: ProtectionTier,
    ) -> Result<ProtectionTier, BrokerError> {
        self.attempts.lock().unwrap().push(tier);
        if !self.supported.contains(&tier) {
            return Err(BrokerError::TierUnavailable(tier));
        }
        let mut keys = self.keys.lock().unwrap();
        if keys.contains_key(&spec.key_id) {
            return Err(BrokerError::AlreadyExists(spec.key_id.clone()));
        }
        let material = if spec.options.algorithm.is_asymmetric() {
            opaque_pair()
        } else {
            KeyMaterial::Secret(SecretBuffer::new(&[0x42; 32]))
        };
        keys.insert(
            spec.key_id.clone(),
            LoadedKey {
                key_id: spec.key_id.clone(),
                profile: spec.options.clone(),
                material,
            },
        );
        Ok(tier)
    }

    async fn delete(&self, key_id: &str) -> Result<bool, BrokerError> {
        Ok(self.keys.lock().unwrap().remove(key_id).is_some())
    }

    async fn retrieve(
        &self,
        key_id: &str,
        handle: AuthorizedHandle,
    ) -> Result<LoadedKey, BrokerError> {
        assert!(handle.authorizes(key_id), "handle for the wrong key");
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .unwrap()
            .get(key_id)
            .cloned()
            .ok_or_else(|| BrokerError::KeyNotFound(key_id.to_owned()))
    }

    async fn retrieve_public(&self, key_id: &str) -> Result<LoadedKey, BrokerError> {
        self.public_retrievals.fetch_add(1, Ordering::SeqCst);
        let keys = self.keys.lock().unwrap();
        let key = keys
            .get(key_id)
            .ok_or_else(|| BrokerError::KeyNotFound(key_id.to_owned()))?;
        let public_key = key
            .material
            .public_key()
            .ok_or_else(|| BrokerError::Policy("no public key".into()))?;
        Ok(LoadedKey {
            key_id: key.key_id.clone(),
            profile: key.profile.clone(),
            material: KeyMaterial::Public(public_key.to_vec()),
        })
    }
}

// ---------------------------------------------------------------------------
// Ciphers
// ---------------------------------------------------------------------------

/// Reversible toy transforms for algorithms the software cipher lacks.
#[derive(Debug, Default)]
pub struct ToyCipher;

fn toy(data: &[u8]) -> Vec<u8> {
    data.iter().map(|byte| byte ^ 0x5A).collect()
}

impl Cipher for ToyCipher {
    fn encrypt(
        &self,
        _key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<Ciphertext, CryptoError> {
        Ok(Ciphertext {
            output: toy(&request.input_data),
            iv: None,
        })
    }

    fn decrypt(
        &self,
        _key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<SecretBuffer, CryptoError> {
        Ok(SecretBuffer::new(&toy(&request.input_data)))
    }

    fn sign(&self, _key: &LoadedKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok([b"sig:".as_slice(), data].concat())
    }

    fn verify(&self, _key: &LoadedKey, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        Ok(signature == [b"sig:".as_slice(), data].concat().as_slice())
    }

    fn mac(&self, _key: &LoadedKey, _data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(vec![0xAA; 32])
    }
}

/// An AES back-end that forgets to append the tag.
#[derive(Debug, Default)]
pub struct TaglessCipher;

impl Cipher for TaglessCipher {
    fn encrypt(
        &self,
        _key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<Ciphertext, CryptoError> {
        Ok(Ciphertext {
            output: toy(&request.input_data),
            iv: Some(vec![0; 12]),
        })
    }

    fn decrypt(
        &self,
        _key: &LoadedKey,
        _request: &SecureOperationRequest,
    ) -> Result<SecretBuffer, CryptoError> {
        Err(CryptoError::Decryption)
    }

    fn sign(&self, _key: &LoadedKey, _data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Signature("unsupported".into()))
    }

    fn verify(&self, _key: &LoadedKey, _data: &[u8], _sig: &[u8]) -> Result<bool, CryptoError> {
        Ok(false)
    }

    fn mac(&self, _key: &LoadedKey, _data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Mac("unsupported".into()))
    }
}
