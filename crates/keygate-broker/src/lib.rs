//! `keygate-broker`: biometric-gated access to stored keys.
//!
//! [`KeyBroker`] runs each request through the authorization gate, the
//! active key store and a cipher, and reports a result value. Cancellation is
//! the only outcome returned as an error.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod backend;
pub mod cancel;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod platform;
pub mod settings;
pub mod software;

pub use backend::{
    AuthorizationContext, AuthorizationService, Cipher, Ciphertext, KeySpec, KeyStore,
    ProtectionTier, VerificationOutcome,
};
pub use cancel::{CancelSignal, CancelSource};
pub use error::{BrokerError, OperationCancelled};
pub use gate::{AuthorizationGate, AuthorizedHandle, GateOutcome, GateState};
pub use orchestrator::KeyBroker;
pub use platform::{create_backend, default_broker, detect_backend_kind, BackendKind};
pub use settings::{BrokerSettings, PromptDefaults};
pub use software::{SoftwareCipher, SoftwareKeyStore};
