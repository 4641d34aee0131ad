//! Key creation policy validation.
//!
//! [`validate`] is pure and deterministic: it inspects a key id and a set of
//! [`CryptoKeyOptions`] and either accepts them or names the first rule they
//! break. Rules are evaluated strictly in the order of [`RULES`]; once one
//! fails, none after it is consulted.
//!
//! | # | Rule                                                     | Message mentions |
//! |---|----------------------------------------------------------|------------------|
//! | 1 | key id blank                                             | `KeyId`          |
//! | 2 | options missing                                          | `null`           |
//! | 3 | no operation                                             | `operation`      |
//! | 4 | GCM with padding                                         | `GCM`            |
//! | 5 | EC with encrypt/decrypt                                  | `EC`             |
//! | 6 | AES with sign/verify                                     | `AES`            |
//! | 7 | AES without block mode, or non-GCM mode without padding  | `BlockMode`      |
//! | 8 | RSA-OAEP with a block mode                               | `OAEP`           |
//! | 9 | key size outside 128..=8192                              | `128`, `8192`    |
//! | 10| RSA below 2048 bits                                      | `2048`           |
//! | 11| EC below 256 bits                                        | `256`            |

use serde::{Deserialize, Serialize};

use crate::policy::{BlockMode, CryptoKeyOptions, CryptoOperations, KeyAlgorithm, Padding};

/// Smallest key size accepted for any algorithm, in bits.
pub const MIN_KEY_SIZE_BITS: u32 = 128;

/// Largest key size accepted for any algorithm, in bits.
pub const MAX_KEY_SIZE_BITS: u32 = 8192;

/// Smallest RSA modulus accepted, in bits.
pub const MIN_RSA_KEY_SIZE_BITS: u32 = 2048;

/// Smallest EC curve size accepted, in bits.
pub const MIN_EC_KEY_SIZE_BITS: u32 = 256;

/// Reported whenever a key id is empty or whitespace.
pub const BLANK_KEY_ID: &str = "KeyId cannot be null or empty.";
const MISSING_OPTIONS: &str = "Options cannot be null.";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of validating a key creation request. Never partially valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "camelCase")]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// One ordered option rule: a predicate that detects a violation and the
/// message reported when it does.
#[derive(Clone, Copy)]
pub struct ValidationRule {
    /// Short stable identifier, useful in logs and tests.
    pub name: &'static str,
    /// Human-readable rejection reason.
    pub message: &'static str,
    violated: fn(&CryptoKeyOptions) -> bool,
}

impl std::fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRule")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl ValidationRule {
    /// Whether `options` break this rule (ignoring every other rule).
    #[must_use]
    pub fn is_violated_by(&self, options: &CryptoKeyOptions) -> bool {
        (self.violated)(options)
    }
}

fn uses_cipher(options: &CryptoKeyOptions) -> bool {
    options.operations.intersects(CryptoOperations::CIPHER)
}

fn uses_signature(options: &CryptoKeyOptions) -> bool {
    options.operations.intersects(CryptoOperations::SIGNATURE)
}

/// Option rules in evaluation order. The key id and the presence of options
/// are checked before any of these.
pub const RULES: &[ValidationRule] = &[
    ValidationRule {
        name: "operations-required",
        message: "At least one operation must be specified.",
        violated: |o| o.operations.is_empty(),
    },
    ValidationRule {
        name: "gcm-without-padding",
        message: "GCM mode cannot be used with padding. Set Padding to None.",
        violated: |o| o.block_mode == BlockMode::Gcm && o.padding != Padding::None,
    },
    ValidationRule {
        name: "ec-no-cipher",
        message: "EC keys cannot be used for encrypt/decrypt operations. Use RSA or AES instead.",
        violated: |o| o.algorithm == KeyAlgorithm::Ec && uses_cipher(o),
    },
    ValidationRule {
        name: "aes-no-signature",
        message: "AES keys cannot be used for sign/verify operations. Use RSA or EC instead.",
        violated: |o| o.algorithm == KeyAlgorithm::Aes && uses_signature(o),
    },
    ValidationRule {
        name: "aes-block-mode",
        message: "AES keys require a valid BlockMode and Padding.",
        violated: |o| {
            o.algorithm == KeyAlgorithm::Aes
                && (o.block_mode == BlockMode::None
                    || (o.block_mode != BlockMode::Gcm && o.padding == Padding::None))
        },
    },
    ValidationRule {
        name: "rsa-oaep-block-mode",
        message: "RSA with OAEP padding cannot be used with a BlockMode. Set BlockMode to None.",
        violated: |o| {
            o.algorithm == KeyAlgorithm::Rsa
                && o.padding == Padding::Oaep
                && o.block_mode != BlockMode::None
        },
    },
    ValidationRule {
        name: "key-size-range",
        message: "Key size must be between 128 and 8192 bits.",
        violated: |o| !(MIN_KEY_SIZE_BITS..=MAX_KEY_SIZE_BITS).contains(&o.key_size_bits),
    },
    ValidationRule {
        name: "rsa-min-size",
        message: "RSA key size must be at least 2048 bits.",
        violated: |o| o.algorithm == KeyAlgorithm::Rsa && o.key_size_bits < MIN_RSA_KEY_SIZE_BITS,
    },
    ValidationRule {
        name: "ec-min-size",
        message: "EC key size must be at least 256 bits.",
        violated: |o| o.algorithm == KeyAlgorithm::Ec && o.key_size_bits < MIN_EC_KEY_SIZE_BITS,
    },
];

/// First option rule broken by `options`, if any.
#[must_use]
pub fn first_violation(options: &CryptoKeyOptions) -> Option<&'static ValidationRule> {
    RULES.iter().find(|rule| rule.is_violated_by(options))
}

/// Validate a key creation request.
///
/// `options` is optional so callers bridging from loosely typed input can
/// report a missing options object the same way as any other rule failure.
#[must_use]
pub fn validate(key_id: &str, options: Option<&CryptoKeyOptions>) -> ValidationOutcome {
    if key_id.trim().is_empty() {
        return ValidationOutcome::Invalid(BLANK_KEY_ID.into());
    }
    let Some(options) = options else {
        return ValidationOutcome::Invalid(MISSING_OPTIONS.into());
    };
    first_violation(options).map_or(ValidationOutcome::Valid, |rule| {
        ValidationOutcome::Invalid(rule.message.into())
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
