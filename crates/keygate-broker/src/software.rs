//! Software back-end: an in-memory key store and a `ring` cipher.
//!
//! Serves devices without secure hardware and stands in for native
//! integrations that are not linked. Keys live only as long as the store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use keygate_core::{
    gcm, mac, signing, transformation, BlockMode, CryptoError, CryptoKeyOptions, KeyAlgorithm,
    KeyMaterial, LoadedKey, Padding, SecretBuffer, SecureOperationRequest,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{Cipher, Ciphertext, KeySpec, KeyStore, ProtectionTier};
use crate::error::BrokerError;
use crate::gate::AuthorizedHandle;

// ---------------------------------------------------------------------------
// Key store
// ---------------------------------------------------------------------------

struct StoredKey {
    profile: CryptoKeyOptions,
    material: KeyMaterial,
}

/// In-memory key store.
///
/// Only ever provides [`ProtectionTier::Software`]. It can be told to
/// advertise a stronger tier, which it will then refuse in `generate`; this
/// is how a device that claims hardware it cannot deliver behaves.
pub struct SoftwareKeyStore {
    keys: RwLock<HashMap<String, StoredKey>>,
    advertised: ProtectionTier,
}

impl SoftwareKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::advertising(ProtectionTier::Software)
    }

    /// A store that claims `tier` as its strongest.
    #[must_use]
    pub fn advertising(tier: ProtectionTier) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            advertised: tier,
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_material(options: &CryptoKeyOptions) -> Result<KeyMaterial, BrokerError> {
    match options.algorithm {
        KeyAlgorithm::Aes
            if options.block_mode != BlockMode::Gcm || options.padding != Padding::None =>
        {
            Err(BrokerError::Unsupported(format!(
                "The software key store only creates AES/GCM/NoPadding keys, not {}.",
                transformation(options.algorithm, options.block_mode, options.padding)
            )))
        }
        KeyAlgorithm::Aes => match options.key_size_bits {
            128 => Ok(KeyMaterial::Secret(SecretBuffer::random(16)?)),
            256 => Ok(KeyMaterial::Secret(SecretBuffer::random(32)?)),
            other => Err(BrokerError::Unsupported(format!(
                "The software key store supports 128- and 256-bit AES keys, not {other}."
            ))),
        },
        KeyAlgorithm::Ec => {
            let pair = signing::generate_ec(options.key_size_bits, options.digest)?;
            Ok(KeyMaterial::Private {
                pkcs8: pair.pkcs8,
                public_key: pair.public_key,
            })
        }
        KeyAlgorithm::Rsa => Err(BrokerError::Unsupported(
            "The software key store cannot generate RSA keys.".into(),
        )),
    }
}

#[async_trait]
impl KeyStore for SoftwareKeyStore {
    fn name(&self) -> &'static str {
        "software"
    }

    fn strongest_tier(&self) -> ProtectionTier {
        self.advertised
    }

    async fn contains_alias(&self, key_id: &str) -> Result<bool, BrokerError> {
        Ok(self.keys.read().await.contains_key(key_id))
    }

    async fn generate(
        &self,
        spec: &KeySpec,
        tier: ProtectionTier,
    ) -> Result<ProtectionTier, BrokerError> {
        if tier != ProtectionTier::Software {
            return Err(BrokerError::TierUnavailable(tier));
        }
        let material = generate_material(&spec.options)?;

        match self.keys.write().await.entry(spec.key_id.clone()) {
            Entry::Occupied(_) => Err(BrokerError::AlreadyExists(spec.key_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(StoredKey {
                    profile: spec.options.clone(),
                    material,
                });
                debug!(key_id = %spec.key_id, algorithm = %spec.options.algorithm, "software key generated");
                Ok(ProtectionTier::Software)
            }
        }
    }

    async fn delete(&self, key_id: &str) -> Result<bool, BrokerError> {
        Ok(self.keys.write().await.remove(key_id).is_some())
    }

    async fn retrieve(
        &self,
        key_id: &str,
        handle: AuthorizedHandle,
    ) -> Result<LoadedKey, BrokerError> {
        if !handle.authorizes(key_id) {
            return Err(BrokerError::Verification(format!(
                "Authorization was granted for key '{}', not '{key_id}'.",
                handle.key_id()
            )));
        }
        let keys = self.keys.read().await;
        let stored = keys
            .get(key_id)
            .ok_or_else(|| BrokerError::KeyNotFound(key_id.to_owned()))?;
        let loaded = LoadedKey {
            key_id: key_id.to_owned(),
            profile: stored.profile.clone(),
            material: stored.material.clone(),
        };
        drop(keys);
        drop(handle);
        Ok(loaded)
    }

    async fn retrieve_public(&self, key_id: &str) -> Result<LoadedKey, BrokerError> {
        let keys = self.keys.read().await;
        let stored = keys
            .get(key_id)
            .ok_or_else(|| BrokerError::KeyNotFound(key_id.to_owned()))?;
        let public_key = stored.material.public_key().ok_or_else(|| {
            BrokerError::Policy(format!("Key '{key_id}' has no public key."))
        })?;
        Ok(LoadedKey {
            key_id: key_id.to_owned(),
            profile: stored.profile.clone(),
            material: KeyMaterial::Public(public_key.to_vec()),
        })
    }
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// `ring`-backed transforms: AES-GCM, ECDSA, RSA PKCS#1 signatures and
/// HMAC-SHA256.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareCipher;

fn require_gcm(request: &SecureOperationRequest) -> Result<(), CryptoError> {
    if request.block_mode == BlockMode::Gcm && request.padding == Padding::None {
        Ok(())
    } else {
        Err(CryptoError::UnsupportedTransformation(format!(
            "{} is not available in software.",
            transformation(request.algorithm, request.block_mode, request.padding)
        )))
    }
}

fn secret(key: &LoadedKey) -> Result<&SecretBuffer, CryptoError> {
    match &key.material {
        KeyMaterial::Secret(secret) => Ok(secret),
        _ => Err(CryptoError::InvalidKeyMaterial(format!(
            "key '{}' has no secret material",
            key.key_id
        ))),
    }
}

fn public_key(key: &LoadedKey) -> Result<&[u8], CryptoError> {
    key.material.public_key().ok_or_else(|| {
        CryptoError::InvalidKeyMaterial(format!("key '{}' has no public key", key.key_id))
    })
}

fn rsa_encryption_unsupported() -> CryptoError {
    CryptoError::UnsupportedTransformation("RSA encryption is not available in software.".into())
}

impl Cipher for SoftwareCipher {
    fn supports(&self, request: &SecureOperationRequest) -> Result<(), CryptoError> {
        match request.algorithm {
            KeyAlgorithm::Aes => require_gcm(request),
            KeyAlgorithm::Rsa => Err(rsa_encryption_unsupported()),
            KeyAlgorithm::Ec => Ok(()),
        }
    }

    fn encrypt(
        &self,
        key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<Ciphertext, CryptoError> {
        match key.algorithm() {
            KeyAlgorithm::Aes => {
                require_gcm(request)?;
                let sealed = gcm::seal(secret(key)?.expose(), &request.input_data)?;
                Ok(Ciphertext {
                    output: sealed.payload,
                    iv: Some(sealed.iv.to_vec()),
                })
            }
            KeyAlgorithm::Rsa => Err(rsa_encryption_unsupported()),
            KeyAlgorithm::Ec => Err(CryptoError::UnsupportedTransformation(
                "EC keys cannot encrypt.".into(),
            )),
        }
    }

    fn decrypt(
        &self,
        key: &LoadedKey,
        request: &SecureOperationRequest,
    ) -> Result<SecretBuffer, CryptoError> {
        match key.algorithm() {
            KeyAlgorithm::Aes => {
                require_gcm(request)?;
                gcm::open(
                    secret(key)?.expose(),
                    request.iv.as_deref(),
                    &request.input_data,
                )
            }
            KeyAlgorithm::Rsa => Err(rsa_encryption_unsupported()),
            KeyAlgorithm::Ec => Err(CryptoError::UnsupportedTransformation(
                "EC keys cannot decrypt.".into(),
            )),
        }
    }

    fn sign(&self, key: &LoadedKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let KeyMaterial::Private { pkcs8, .. } = &key.material else {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "key '{}' has no private key",
                key.key_id
            )));
        };
        match key.algorithm() {
            KeyAlgorithm::Ec => {
                signing::sign_ec(key.profile.key_size_bits, key.profile.digest, pkcs8, data)
            }
            KeyAlgorithm::Rsa => signing::sign_rsa(key.profile.digest, pkcs8, data),
            KeyAlgorithm::Aes => Err(CryptoError::UnsupportedTransformation(
                "AES keys cannot sign.".into(),
            )),
        }
    }

    fn verify(&self, key: &LoadedKey, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        match key.algorithm() {
            KeyAlgorithm::Ec => signing::verify_ec(
                key.profile.key_size_bits,
                key.profile.digest,
                public_key(key)?,
                data,
                signature,
            ),
            KeyAlgorithm::Rsa => {
                signing::verify_rsa(key.profile.digest, public_key(key)?, data, signature)
            }
            KeyAlgorithm::Aes => Err(CryptoError::UnsupportedTransformation(
                "AES keys cannot verify signatures.".into(),
            )),
        }
    }

    fn mac(&self, key: &LoadedKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        mac::compute(secret(key)?, data)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
