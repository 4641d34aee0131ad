//! Per-operation authorization state machine.
//!
//! ```text
//! Idle ──> Prompting ──> Authorized
//!   │          ├──────> Denied
//!   │          ├──────> Cancelled
//!   │          └──────> Error
//!   ├──> Cancelled      (signal already set: no UI)
//!   └──> Unavailable    (capability check failed: no UI)
//! ```
//!
//! Each gate resolves exactly once. The [`AuthorizedHandle`] it yields is
//! move-only and invalidates its platform context when dropped, whichever
//! way the operation ends.

use std::fmt;
use std::future;
use std::time::Duration;

use keygate_core::PromptOptions;
use tracing::{debug, warn};

use crate::backend::{AuthorizationContext, AuthorizationService, VerificationOutcome};
use crate::cancel::CancelSignal;

/// Where a gate is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Prompting,
    Authorized,
    Denied,
    Cancelled,
    Unavailable,
    Error,
}

impl GateState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Prompting)
    }
}

// ---------------------------------------------------------------------------
// Authorized handle
// ---------------------------------------------------------------------------

/// Proof of one successful verification for one key.
///
/// Not `Clone`: a key store consumes it on retrieval. Dropping it invalidates
/// the underlying context.
pub struct AuthorizedHandle {
    key_id: String,
    context: Option<Box<dyn AuthorizationContext>>,
}

impl AuthorizedHandle {
    pub(crate) fn new(key_id: &str, context: Box<dyn AuthorizationContext>) -> Self {
        Self {
            key_id: key_id.to_owned(),
            context: Some(context),
        }
    }

    /// The key this authorization was granted for.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Whether this handle may unlock `key_id`.
    #[must_use]
    pub fn authorizes(&self, key_id: &str) -> bool {
        self.key_id == key_id && self.context.is_some()
    }
}

impl Drop for AuthorizedHandle {
    fn drop(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.invalidate();
        }
    }
}

impl fmt::Debug for AuthorizedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedHandle")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// How a gate resolved.
#[derive(Debug)]
pub enum GateOutcome {
    Authorized(AuthorizedHandle),
    Denied(String),
    Cancelled,
    Unavailable(String),
    Error(String),
}

const UNAVAILABLE: &str = "User verification is not available on this device.";
const TIMED_OUT: &str = "User verification timed out.";
const ALREADY_USED: &str = "Authorization gate has already been used.";

/// One user-presence check for one protected operation.
pub struct AuthorizationGate<'a> {
    service: &'a dyn AuthorizationService,
    timeout: Option<Duration>,
    state: GateState,
}

impl<'a> AuthorizationGate<'a> {
    #[must_use]
    pub fn new(service: &'a dyn AuthorizationService, timeout: Option<Duration>) -> Self {
        Self {
            service,
            timeout,
            state: GateState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// Run the gate for `key_id`.
    ///
    /// A second call on the same gate resolves to [`GateOutcome::Error`]
    /// without prompting.
    pub async fn authorize(
        &mut self,
        key_id: &str,
        prompt: &PromptOptions,
        cancel: &CancelSignal,
    ) -> GateOutcome {
        if self.state != GateState::Idle {
            return GateOutcome::Error(ALREADY_USED.into());
        }
        if cancel.is_cancelled() {
            debug!(key_id = %key_id, "cancelled before prompting");
            return self.resolve(GateOutcome::Cancelled);
        }

        let service = self.service;
        if !service
            .can_verify(prompt.auth_strength, prompt.allow_password_fallback)
            .await
        {
            warn!(key_id = %key_id, service = service.name(), "user verification unavailable");
            return self.resolve(GateOutcome::Unavailable(UNAVAILABLE.into()));
        }
        if cancel.is_cancelled() {
            return self.resolve(GateOutcome::Cancelled);
        }

        self.state = GateState::Prompting;
        debug!(key_id = %key_id, service = service.name(), "prompting for verification");

        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => future::pending().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                service.abandon();
                GateOutcome::Cancelled
            }
            () = deadline => {
                service.abandon();
                warn!(key_id = %key_id, "verification prompt timed out");
                GateOutcome::Error(TIMED_OUT.into())
            }
            verification = service.verify(prompt, cancel) => {
                Self::interpret(key_id, verification, cancel)
            }
        };
        self.resolve(outcome)
    }

    fn interpret(
        key_id: &str,
        verification: VerificationOutcome,
        cancel: &CancelSignal,
    ) -> GateOutcome {
        match verification {
            VerificationOutcome::Verified(context) => {
                let handle = AuthorizedHandle::new(key_id, context);
                if cancel.is_cancelled() {
                    // Late success loses to the signal; dropping invalidates it.
                    drop(handle);
                    GateOutcome::Cancelled
                } else {
                    GateOutcome::Authorized(handle)
                }
            }
            VerificationOutcome::Denied(reason) => GateOutcome::Denied(reason),
            VerificationOutcome::Unavailable(reason) => GateOutcome::Unavailable(reason),
            VerificationOutcome::Cancelled => GateOutcome::Cancelled,
            VerificationOutcome::Failed(reason) => GateOutcome::Error(reason),
        }
    }

    fn resolve(&mut self, outcome: GateOutcome) -> GateOutcome {
        self.state = match &outcome {
            GateOutcome::Authorized(_) => GateState::Authorized,
            GateOutcome::Denied(_) => GateState::Denied,
            GateOutcome::Cancelled => GateState::Cancelled,
            GateOutcome::Unavailable(_) => GateState::Unavailable,
            GateOutcome::Error(_) => GateState::Error,
        };
        debug!(state = ?self.state, "authorization gate resolved");
        outcome
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use keygate_core::AuthStrength;

    use super::*;
    use crate::cancel::CancelSource;

    struct Counted(Arc<AtomicUsize>);

    impl AuthorizationContext for Counted {
        fn invalidate(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Approve {
        invalidated: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AuthorizationService for Approve {
        fn name(&self) -> &'static str {
            "approve"
        }

        async fn can_verify(&self, _strength: AuthStrength, _allow_fallback: bool) -> bool {
            true
        }

        async fn verify(&self, _prompt: &PromptOptions, _cancel: &CancelSignal) -> VerificationOutcome {
            VerificationOutcome::Verified(Box::new(Counted(Arc::clone(&self.invalidated))))
        }
    }

    #[tokio::test]
    async fn approval_yields_handle_for_key() {
        let invalidated = Arc::new(AtomicUsize::new(0));
        let service = Approve {
            invalidated: Arc::clone(&invalidated),
        };
        let mut gate = AuthorizationGate::new(&service, None);
        assert_eq!(gate.state(), GateState::Idle);

        let outcome = gate
            .authorize("k", &PromptOptions::default(), &CancelSignal::never())
            .await;
        assert_eq!(gate.state(), GateState::Authorized);
        let handle = match outcome {
            GateOutcome::Authorized(handle) => handle,
            other => panic!("expected authorization, got {other:?}"),
        };
        assert!(handle.authorizes("k"));
        assert!(!handle.authorizes("other"));
        assert_eq!(invalidated.load(Ordering::SeqCst), 0);

        drop(handle);
        assert_eq!(invalidated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gate_resolves_only_once() {
        let service = Approve {
            invalidated: Arc::new(AtomicUsize::new(0)),
        };
        let mut gate = AuthorizationGate::new(&service, None);
        let prompt = PromptOptions::default();
        let _first = gate.authorize("k", &prompt, &CancelSignal::never()).await;
        let second = gate.authorize("k", &prompt, &CancelSignal::never()).await;
        assert!(matches!(second, GateOutcome::Error(_)));
        assert_eq!(gate.state(), GateState::Authorized);
    }

    #[tokio::test]
    async fn pre_cancelled_signal_short_circuits() {
        let invalidated = Arc::new(AtomicUsize::new(0));
        let service = Approve {
            invalidated: Arc::clone(&invalidated),
        };
        let source = CancelSource::new();
        source.cancel();
        let mut gate = AuthorizationGate::new(&service, None);
        let outcome = gate
            .authorize("k", &PromptOptions::default(), &source.signal())
            .await;
        assert!(matches!(outcome, GateOutcome::Cancelled));
        assert_eq!(gate.state(), GateState::Cancelled);
        assert_eq!(invalidated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn terminal_states() {
        assert!(!GateState::Idle.is_terminal());
        assert!(!GateState::Prompting.is_terminal());
        assert!(GateState::Authorized.is_terminal());
        assert!(GateState::Error.is_terminal());
    }
}
