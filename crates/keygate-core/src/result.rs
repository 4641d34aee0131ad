//! Operation outcomes returned to callers.
//!
//! - [`KeyOperationResult`]: create / delete / exists
//! - [`SecureOperationResponse`]: encrypt / decrypt / sign / verify / mac
//!
//! Both are built only through their `success`/`failure` factories and are
//! read-only afterwards. A successful value never carries an error message;
//! a failed value always carries one, together with a [`FailureKind`].
//! Deserialization enforces the same shape and rejects anything else.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::validation::ValidationOutcome;

// ---------------------------------------------------------------------------
// Failure taxonomy
// ---------------------------------------------------------------------------

/// Why an operation failed, so callers can decide whether to fix the
/// request, retry, prompt differently, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Malformed request (blank key id, empty input, missing IV or signature).
    InvalidRequest,
    /// A key creation or usage policy rule was broken. Never touched hardware.
    PolicyViolation,
    /// The key or alias does not exist.
    NotFound,
    /// An alias with the requested id already exists.
    AlreadyExists,
    /// User verification explicitly failed.
    AuthorizationDenied,
    /// User verification cannot be performed on this device right now.
    AuthorizationUnavailable,
    /// The cipher, signature or MAC operation itself failed.
    CryptoFailure,
    /// The platform capability or key store is absent or broken.
    BackendUnavailable,
}

impl FailureKind {
    /// Whether the same request could succeed later without changing it
    /// (e.g. the user mis-scanned a finger).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthorizationDenied)
    }
}

// ---------------------------------------------------------------------------
// KeyOperationResult
// ---------------------------------------------------------------------------

/// Outcome of a key lifecycle operation (create, delete, exists).
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOperationResult {
    successful: bool,
    error_message: Option<String>,
    failure_kind: Option<FailureKind>,
    additional_info: Option<String>,
    security_level: Option<String>,
}

impl KeyOperationResult {
    /// A successful outcome, optionally naming the protection tier actually
    /// achieved and an informational note.
    pub const fn success(security_level: Option<String>, additional_info: Option<String>) -> Self {
        Self {
            successful: true,
            error_message: None,
            failure_kind: None,
            additional_info,
            security_level,
        }
    }

    /// A successful outcome carrying only an informational note.
    pub fn success_with_info(additional_info: impl Into<String>) -> Self {
        Self::success(None, Some(additional_info.into()))
    }

    /// A failed outcome.
    pub fn failure(kind: FailureKind, error_message: impl Into<String>) -> Self {
        Self {
            successful: false,
            error_message: Some(error_message.into()),
            failure_kind: Some(kind),
            additional_info: None,
            security_level: None,
        }
    }

    /// A failed outcome with an extra note (e.g. a retry hint).
    pub fn failure_with_info(
        kind: FailureKind,
        error_message: impl Into<String>,
        additional_info: impl Into<String>,
    ) -> Self {
        Self {
            additional_info: Some(additional_info.into()),
            ..Self::failure(kind, error_message)
        }
    }

    /// Map a validation outcome: `Valid` → success, `Invalid` → policy violation.
    pub fn from_validation(outcome: ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Valid => Self::success(None, None),
            ValidationOutcome::Invalid(reason) => Self::failure(FailureKind::PolicyViolation, reason),
        }
    }

    #[must_use]
    pub const fn is_successful(&self) -> bool {
        self.successful
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        self.failure_kind
    }

    #[must_use]
    pub fn additional_info(&self) -> Option<&str> {
        self.additional_info.as_deref()
    }

    /// Label of the protection tier the key actually received.
    #[must_use]
    pub fn security_level(&self) -> Option<&str> {
        self.security_level.as_deref()
    }
}

// ---------------------------------------------------------------------------
// SecureOperationResponse
// ---------------------------------------------------------------------------

/// Outcome of a cryptographic operation.
///
/// Buffers handed to [`SecureOperationResponse::success`] are copied, so
/// the caller may reuse or wipe its own buffers afterwards. Output buffers
/// are zeroized when the response is dropped because they may hold
/// plaintext.
#[must_use]
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureOperationResponse {
    successful: bool,
    output_data: Option<Vec<u8>>,
    iv: Option<Vec<u8>>,
    error_message: Option<String>,
    failure_kind: Option<FailureKind>,
}

impl SecureOperationResponse {
    /// A successful response holding owned copies of `output_data` and `iv`.
    pub fn success(output_data: &[u8], iv: Option<&[u8]>) -> Self {
        Self {
            successful: true,
            output_data: Some(output_data.to_vec()),
            iv: iv.map(<[u8]>::to_vec),
            error_message: None,
            failure_kind: None,
        }
    }

    /// A failed response. Never carries output or IV.
    pub fn failure(kind: FailureKind, error_message: impl Into<String>) -> Self {
        Self {
            successful: false,
            output_data: None,
            iv: None,
            error_message: Some(error_message.into()),
            failure_kind: Some(kind),
        }
    }

    #[must_use]
    pub const fn is_successful(&self) -> bool {
        self.successful
    }

    #[must_use]
    pub fn output_data(&self) -> Option<&[u8]> {
        self.output_data.as_deref()
    }

    #[must_use]
    pub fn iv(&self) -> Option<&[u8]> {
        self.iv.as_deref()
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        self.failure_kind
    }
}

impl Drop for SecureOperationResponse {
    fn drop(&mut self) {
        if let Some(output) = self.output_data.as_mut() {
            output.zeroize();
        }
    }
}

impl fmt::Debug for SecureOperationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureOperationResponse")
            .field("successful", &self.successful)
            .field("output_len", &self.output_data.as_ref().map(Vec::len))
            .field("iv_len", &self.iv.as_ref().map(Vec::len))
            .field("error_message", &self.error_message)
            .field("failure_kind", &self.failure_kind)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Checked deserialization
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyOperationRecord {
    successful: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    failure_kind: Option<FailureKind>,
    #[serde(default)]
    additional_info: Option<String>,
    #[serde(default)]
    security_level: Option<String>,
}

impl<'de> Deserialize<'de> for KeyOperationResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = KeyOperationRecord::deserialize(deserializer)?;
        match (record.successful, record.error_message, record.failure_kind) {
            (true, None, None) => Ok(Self::success(
                record.security_level,
                record.additional_info,
            )),
            (false, Some(message), Some(kind)) if record.security_level.is_none() => {
                Ok(Self {
                    additional_info: record.additional_info,
                    ..Self::failure(kind, message)
                })
            }
            (true, ..) => Err(de::Error::custom(
                "a successful result cannot carry an error message or failure kind",
            )),
            (false, ..) => Err(de::Error::custom(
                "a failed result needs an error message and failure kind and no security level",
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationRecord {
    successful: bool,
    #[serde(default)]
    output_data: Option<Vec<u8>>,
    #[serde(default)]
    iv: Option<Vec<u8>>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    failure_kind: Option<FailureKind>,
}

impl<'de> Deserialize<'de> for SecureOperationResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut record = OperationRecord::deserialize(deserializer)?;
        let outcome = match (
            record.successful,
            record.output_data.as_deref(),
            record.error_message.take(),
            record.failure_kind,
        ) {
            (true, Some(output), None, None) => {
                Ok(Self::success(output, record.iv.as_deref()))
            }
            (false, None, Some(message), Some(kind)) if record.iv.is_none() => {
                Ok(Self::failure(kind, message))
            }
            (true, ..) => Err(de::Error::custom(
                "a successful response needs output data and no error",
            )),
            (false, ..) => Err(de::Error::custom(
                "a failed response needs an error message and failure kind and no buffers",
            )),
        };
        if let Some(output) = record.output_data.as_mut() {
            output.zeroize();
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_success_has_no_error() {
        let result = KeyOperationResult::success(Some("TEE".into()), Some("Key created.".into()));
        assert!(result.is_successful());
        assert!(result.error_message().is_none());
        assert!(result.failure_kind().is_none());
        assert_eq!(result.security_level(), Some("TEE"));
        assert_eq!(result.additional_info(), Some("Key created."));
    }

    #[test]
    fn key_failure_carries_message_and_kind() {
        let result = KeyOperationResult::failure(FailureKind::NotFound, "Key 'x' does not exist.");
        assert!(!result.is_successful());
        assert_eq!(result.error_message(), Some("Key 'x' does not exist."));
        assert_eq!(result.failure_kind(), Some(FailureKind::NotFound));
        assert!(result.security_level().is_none());
    }

    #[test]
    fn key_failure_with_info_keeps_both() {
        let result = KeyOperationResult::failure_with_info(
            FailureKind::BackendUnavailable,
            "StrongBox unavailable",
            "retry at TEE",
        );
        assert_eq!(result.error_message(), Some("StrongBox unavailable"));
        assert_eq!(result.additional_info(), Some("retry at TEE"));
    }

    #[test]
    fn from_validation_maps_both_arms() {
        assert!(KeyOperationResult::from_validation(ValidationOutcome::Valid).is_successful());
        let failed =
            KeyOperationResult::from_validation(ValidationOutcome::Invalid("GCM".into()));
        assert_eq!(failed.failure_kind(), Some(FailureKind::PolicyViolation));
        assert_eq!(failed.error_message(), Some("GCM"));
    }

    #[test]
    fn response_success_copies_buffers() {
        let mut output = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let mut iv = vec![1, 2, 3];
        let response = SecureOperationResponse::success(&output, Some(&iv));

        output[0] = 0x00;
        iv[0] = 0xFF;

        assert_eq!(response.output_data(), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
        assert_eq!(response.iv(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn response_success_without_iv() {
        let response = SecureOperationResponse::success(b"hello", None);
        assert!(response.is_successful());
        assert!(response.iv().is_none());
        assert!(response.error_message().is_none());
    }

    #[test]
    fn response_failure_has_no_buffers() {
        let response = SecureOperationResponse::failure(FailureKind::CryptoFailure, "bad tag");
        assert!(!response.is_successful());
        assert!(response.output_data().is_none());
        assert!(response.iv().is_none());
        assert_eq!(response.error_message(), Some("bad tag"));
    }

    #[test]
    fn response_debug_does_not_print_output() {
        let response = SecureOperationResponse::success(&[0xAB; 8], None);
        let debug = format!("{response:?}");
        assert!(debug.contains("output_len: Some(8)"));
        assert!(!debug.contains("171"));
    }

    #[test]
    fn key_result_created_snapshot() {
        insta::assert_json_snapshot!(KeyOperationResult::success(
            Some("TEE".into()),
            Some("Key created with TEE security (StrongBox fell back)".into()),
        ));
    }

    #[test]
    fn response_failure_snapshot() {
        insta::assert_json_snapshot!(SecureOperationResponse::failure(
            FailureKind::InvalidRequest,
            "Input data is too short for AES-GCM decryption.",
        ));
    }

    #[test]
    fn factory_values_survive_json() {
        let created = KeyOperationResult::success(Some("TEE".into()), Some("note".into()));
        let json = serde_json::to_string(&created).unwrap();
        assert_eq!(serde_json::from_str::<KeyOperationResult>(&json).unwrap(), created);

        let failed = KeyOperationResult::failure_with_info(FailureKind::NotFound, "gone", "hint");
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(serde_json::from_str::<KeyOperationResult>(&json).unwrap(), failed);

        let sealed = SecureOperationResponse::success(&[1, 2, 3], Some(&[9; 12]));
        let json = serde_json::to_string(&sealed).unwrap();
        assert_eq!(serde_json::from_str::<SecureOperationResponse>(&json).unwrap(), sealed);

        let rejected = SecureOperationResponse::failure(FailureKind::CryptoFailure, "bad tag");
        let json = serde_json::to_string(&rejected).unwrap();
        assert_eq!(serde_json::from_str::<SecureOperationResponse>(&json).unwrap(), rejected);
    }

    #[test]
    fn inconsistent_key_results_are_rejected() {
        for json in [
            r#"{"successful":true,"errorMessage":"boom","failureKind":"notFound"}"#,
            r#"{"successful":true,"failureKind":"notFound"}"#,
            r#"{"successful":false,"errorMessage":"boom"}"#,
            r#"{"successful":false,"failureKind":"notFound"}"#,
            r#"{"successful":false,"errorMessage":"boom","failureKind":"notFound","securityLevel":"TEE"}"#,
        ] {
            assert!(serde_json::from_str::<KeyOperationResult>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn inconsistent_responses_are_rejected() {
        for json in [
            r#"{"successful":false,"outputData":[1,2,3],"iv":[9]}"#,
            r#"{"successful":false,"outputData":[1],"errorMessage":"x","failureKind":"cryptoFailure"}"#,
            r#"{"successful":false,"iv":[9],"errorMessage":"x","failureKind":"cryptoFailure"}"#,
            r#"{"successful":true,"outputData":[1],"errorMessage":"x"}"#,
            r#"{"successful":true}"#,
        ] {
            assert!(serde_json::from_str::<SecureOperationResponse>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn only_denial_is_retryable() {
        assert!(FailureKind::AuthorizationDenied.is_retryable());
        assert!(!FailureKind::AuthorizationUnavailable.is_retryable());
        assert!(!FailureKind::PolicyViolation.is_retryable());
    }
}
