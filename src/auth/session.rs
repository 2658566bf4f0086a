//! Session model and the in-memory authentication state machine.
//!
//! `AuthState` is the single authoritative representation of the current
//! session. All writes go through [`AuthState::apply`]; collaborators only
//! ever see a shared reference.

use chrono::{DateTime, Utc};

/// An authenticated identity with its opaque credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        email: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.into(),
            user_id: user_id.into(),
            token: token.into(),
            expires_at,
        }
    }

    /// A session is valid while it holds a non-empty token that has not
    /// passed its expiration instant.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && Utc::now() < self.expires_at
    }

    /// The credential, gated on validity. Returns `None` for an empty or
    /// expired token so callers cannot accidentally attach a dead credential.
    pub fn token(&self) -> Option<&str> {
        if self.is_valid() {
            Some(self.token.as_str())
        } else {
            None
        }
    }

    /// Time remaining until expiry. Negative once the session is stale.
    pub fn time_until_expiry(&self) -> chrono::Duration {
        self.expires_at - Utc::now()
    }
}

/// A state transition produced by the lifecycle orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A login/signup request was accepted and is now in flight.
    AttemptStarted,
    /// A login, signup, or restore completed successfully.
    Authenticated(Session),
    /// A login or signup terminated with a user-facing error message.
    Failed(String),
    /// Explicit logout or the expiration timer firing.
    LoggedOut,
    /// The UI has shown the error once and asked for it to be dropped.
    ErrorCleared,
}

/// The session state exposed to every collaborator.
///
/// `loading` is true only strictly between `AttemptStarted` and the terminal
/// transition of that attempt. `user` and `auth_error` are never both set by
/// the same transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<Session>,
    pub auth_error: Option<String>,
    pub loading: bool,
}

impl AuthState {
    /// Apply a transition. Total: every transition is accepted in every
    /// state, and one that does not change anything is a no-op.
    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::AttemptStarted => {
                self.auth_error = None;
                self.loading = true;
            }
            Transition::Authenticated(session) => {
                self.user = Some(session);
                self.auth_error = None;
                self.loading = false;
            }
            Transition::Failed(message) => {
                self.user = None;
                self.auth_error = Some(message);
                self.loading = false;
            }
            Transition::LoggedOut => {
                self.user = None;
                self.loading = false;
            }
            Transition::ErrorCleared => {
                self.auth_error = None;
            }
        }
    }

    /// Whether a valid session is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.user.as_ref().map(Session::is_valid).unwrap_or(false)
    }

    /// Whether a login/signup/restore is in flight.
    pub fn is_pending(&self) -> bool {
        self.loading
    }
}

// ============================================================================
// Tests
// ============================================================================
