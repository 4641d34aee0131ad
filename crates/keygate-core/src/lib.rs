//! `keygate-core`: back-end independent pieces of KEYGATE.
//!
//! Synchronous and I/O-free. Holds the key creation validator, the result
//! model, the AES-GCM wire codec and the software primitives a back-end
//! without secure hardware runs on.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod policy;
pub mod validation;

pub mod request;
pub mod result;

pub mod gcm;
pub mod mac;
pub mod material;
pub mod signing;

pub use error::CryptoError;
pub use gcm::{check_open_input, check_sealed_layout, open, seal, split_tag, Sealed, IV_LEN, TAG_LEN};
pub use material::{KeyMaterial, LoadedKey};
pub use memory::SecretBuffer;
pub use policy::{
    transformation, BlockMode, CryptoKeyOptions, CryptoOperations, Digest, KeyAlgorithm, Padding,
};
pub use request::{AuthStrength, PromptOptions, SecureOperationRequest};
pub use result::{FailureKind, KeyOperationResult, SecureOperationResponse};
pub use validation::{validate, ValidationOutcome, ValidationRule, BLANK_KEY_ID, RULES};
