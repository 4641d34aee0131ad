//! Back-end selection and the process-wide default broker.
//!
//! ```text
//! BackendKind (detected at compile time)
//! ├── HardwareKeystore       (Android keystore + biometric prompt)
//! ├── SecureEnclaveKeychain  (Apple keychain + local authentication)
//! ├── CredentialManager      (Windows credential/signing service)
//! └── Software               (in-memory store, everything else)
//! ```
//!
//! Native integrations are separate collaborators implementing the traits
//! in [`crate::backend`]. Until one is linked, every kind is served by the
//! software store with [`NullAuthorizationService`], so protected operations
//! report verification as unavailable.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use keygate_core::{AuthStrength, PromptOptions};
use tracing::{info, warn};

use crate::backend::{AuthorizationService, VerificationOutcome};
use crate::cancel::CancelSignal;
use crate::orchestrator::KeyBroker;
use crate::settings::BrokerSettings;
use crate::software::{SoftwareCipher, SoftwareKeyStore};

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

/// Family of native key storage on the current platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    HardwareKeystore,
    SecureEnclaveKeychain,
    CredentialManager,
    Software,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HardwareKeystore => "hardware-keystore",
            Self::SecureEnclaveKeychain => "secure-enclave-keychain",
            Self::CredentialManager => "credential-manager",
            Self::Software => "software",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the back-end family at compile time.
#[must_use]
pub const fn detect_backend_kind() -> BackendKind {
    #[cfg(target_os = "android")]
    {
        BackendKind::HardwareKeystore
    }
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        BackendKind::SecureEnclaveKeychain
    }
    #[cfg(target_os = "windows")]
    {
        BackendKind::CredentialManager
    }
    #[cfg(not(any(
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows"
    )))]
    {
        BackendKind::Software
    }
}

// ---------------------------------------------------------------------------
// Null authorization service (fallback)
// ---------------------------------------------------------------------------

/// Fallback when no verification facility is linked. Never verifies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuthorizationService;

#[async_trait]
impl AuthorizationService for NullAuthorizationService {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn can_verify(&self, _strength: AuthStrength, _allow_fallback: bool) -> bool {
        false
    }

    async fn verify(&self, _prompt: &PromptOptions, _cancel: &CancelSignal) -> VerificationOutcome {
        VerificationOutcome::Unavailable(
            "No user verification facility is available on this device.".into(),
        )
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build a broker for `kind`.
#[must_use]
pub fn create_backend(kind: BackendKind, settings: BrokerSettings) -> KeyBroker {
    if kind != BackendKind::Software {
        warn!(backend = %kind, "native integration not linked; serving keys from the software store");
    }
    let broker = KeyBroker::new(
        Arc::new(SoftwareKeyStore::new()),
        Arc::new(NullAuthorizationService),
        Arc::new(SoftwareCipher),
    )
    .with_settings(settings);
    info!(backend = %kind, store = broker.backend_name(), "key broker ready");
    broker
}

/// Lazily built broker for the detected platform with default settings.
///
/// A convenience for callers without their own wiring; prefer building a
/// [`KeyBroker`] explicitly.
pub fn default_broker() -> &'static KeyBroker {
    static DEFAULT: OnceLock<KeyBroker> = OnceLock::new();
    DEFAULT.get_or_init(|| create_backend(detect_backend_kind(), BrokerSettings::default()))
}
