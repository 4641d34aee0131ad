//! Broker error types.
//!
//! [`BrokerError`] never crosses the public API: every operation turns it into
//! a failure result carrying a [`FailureKind`]. Cancellation is the one
//! outcome reported out of band, as [`OperationCancelled`].

use std::error::Error as StdError;

use keygate_core::{CryptoError, FailureKind, KeyOperationResult, SecureOperationResponse};
use thiserror::Error;

use crate::backend::ProtectionTier;

/// Boxed source error from a platform collaborator.
pub type BackendSource = Box<dyn StdError + Send + Sync + 'static>;

/// Everything that can go wrong between a request and its response.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Malformed request detected by the broker.
    #[error("{0}")]
    InvalidRequest(String),

    /// The key exists but may not be used this way.
    #[error("{0}")]
    Policy(String),

    #[error("Key '{0}' does not exist.")]
    KeyNotFound(String),

    #[error("Key with alias '{0}' already exists.")]
    AlreadyExists(String),

    /// The key store cannot create keys at this protection tier.
    #[error("{0} protection is not available on this device.")]
    TierUnavailable(ProtectionTier),

    /// The back-end cannot perform this kind of request at all.
    #[error("{0}")]
    Unsupported(String),

    /// A key store or platform call failed.
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: Option<BackendSource>,
    },

    /// User verification explicitly failed.
    #[error("{0}")]
    Denied(String),

    /// User verification cannot run on this device.
    #[error("{0}")]
    VerificationUnavailable(String),

    /// The verification facility itself failed or timed out.
    #[error("{0}")]
    Verification(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl BrokerError {
    /// Key store failure with an underlying cause.
    pub fn backend(message: impl Into<String>, source: impl Into<BackendSource>) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The failure category reported to callers.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest(_) | Self::Crypto(CryptoError::Framing(_)) => {
                FailureKind::InvalidRequest
            }
            Self::Policy(_) => FailureKind::PolicyViolation,
            Self::KeyNotFound(_) => FailureKind::NotFound,
            Self::AlreadyExists(_) => FailureKind::AlreadyExists,
            Self::TierUnavailable(_)
            | Self::Unsupported(_)
            | Self::Backend { .. }
            | Self::Verification(_) => FailureKind::BackendUnavailable,
            Self::Denied(_) => FailureKind::AuthorizationDenied,
            Self::VerificationUnavailable(_) => FailureKind::AuthorizationUnavailable,
            Self::Crypto(_) => FailureKind::CryptoFailure,
        }
    }

    /// This error's message followed by each source's, joined by `" --> "`.
    #[must_use]
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(" --> ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    pub fn into_response(self) -> SecureOperationResponse {
        SecureOperationResponse::failure(self.kind(), self.full_message())
    }

    pub fn into_key_result(self) -> KeyOperationResult {
        KeyOperationResult::failure(self.kind(), self.full_message())
    }
}

/// The operation was aborted through its cancellation signal.
///
/// Distinct from a failure result: a declined prompt is `Ok(failure)`, an
/// aborted one is `Err(OperationCancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("The operation was cancelled.")]
pub struct OperationCancelled;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            BrokerError::KeyNotFound("k".into()).kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            BrokerError::TierUnavailable(ProtectionTier::StrongBox).kind(),
            FailureKind::BackendUnavailable
        );
        assert_eq!(
            BrokerError::Crypto(CryptoError::Decryption).kind(),
            FailureKind::CryptoFailure
        );
        assert_eq!(
            BrokerError::Crypto(CryptoError::Framing("IV".into())).kind(),
            FailureKind::InvalidRequest
        );
        assert_eq!(
            BrokerError::Denied("no".into()).kind(),
            FailureKind::AuthorizationDenied
        );
    }

    #[test]
    fn full_message_joins_source_chain() {
        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "keystore locked");
        let err = BrokerError::backend("Failed to delete key 'k'.", inner);
        assert_eq!(err.full_message(), "Failed to delete key 'k'. --> keystore locked");
    }

    #[test]
    fn messages_name_the_alias() {
        assert_eq!(
            BrokerError::AlreadyExists("vault".into()).to_string(),
            "Key with alias 'vault' already exists."
        );
        assert_eq!(
            BrokerError::KeyNotFound("vault".into()).to_string(),
            "Key 'vault' does not exist."
        );
    }

    #[test]
    fn into_response_is_a_failure() {
        let response = BrokerError::Policy("nope".into()).into_response();
        assert!(!response.is_successful());
        assert_eq!(response.failure_kind(), Some(FailureKind::PolicyViolation));
        assert_eq!(response.error_message(), Some("nope"));
    }
}
