//! Lifecycle orchestration.
//!
//! `AuthOrchestrator` is the only writer of [`AuthState`]. Every lifecycle
//! event lands here; the orchestrator performs the side effect (identity
//! call, store read/write, timer arm/disarm) and commits the resulting
//! transition. Operations take `&mut self`, so each transition runs to
//! completion before the next event is processed.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{AuthError, AuthResponseData, IdentityOp, IdentityProvider};

use super::session::{AuthState, Session, Transition};
use super::store::CredentialStore;
use super::timer::{ExpirationTimer, Expired};

/// Buffer size for the expiry message channel. One armed schedule exists at
/// a time, so a small buffer has plenty of headroom.
const EXPIRY_CHANNEL_BUFFER: usize = 8;

/// Message shown when a login/signup is submitted with a blank field; the
/// request never reaches the identity endpoint.
const MISSING_CREDENTIALS_MESSAGE: &str = "Email and password are required.";

/// Terminal outcome of a lifecycle operation, consumed by navigation.
///
/// Failures never surface as `Err`: they terminate as an anonymous state
/// carrying `auth_error`, and the outcome only tags which way the operation
/// went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A session was established. `redirect` is true for interactive
    /// login/signup and false for a restore, so a restore does not yank the
    /// user away from wherever they reopened the app.
    Authenticated { redirect: bool },
    /// The attempt failed; the user-facing message is in the state.
    Failed,
    /// Restore found nothing usable; the state was not touched.
    NoSession,
    /// Explicit logout; navigate to the entry surface.
    LoggedOut,
    /// The expiration timer fired. Identical effect to `LoggedOut`.
    Expired,
}

pub struct AuthOrchestrator<P> {
    provider: P,
    store: CredentialStore,
    timer: ExpirationTimer,
    state: AuthState,
    /// Bumped whenever a session ends and whenever a new one is
    /// established, so every session owns its own generation. A timer
    /// message from an earlier generation is stale and gets discarded; an
    /// expiry armed by a session that has since logged out or been replaced
    /// can never tear down the current one.
    generation: u64,
    expiry_tx: mpsc::Sender<Expired>,
    expiry_rx: mpsc::Receiver<Expired>,
}

impl<P: IdentityProvider> AuthOrchestrator<P> {
    pub fn new(provider: P, store: CredentialStore) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::channel(EXPIRY_CHANNEL_BUFFER);
        Self {
            provider,
            store,
            timer: ExpirationTimer::new(),
            state: AuthState::default(),
            generation: 0,
            expiry_tx,
            expiry_rx,
        }
    }

    /// Read-only view of the current session state.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Verify an existing account's credentials.
    pub async fn login(&mut self, email: &str, password: &str) -> AuthOutcome {
        self.attempt(IdentityOp::VerifyPassword, email, password).await
    }

    /// Create a new account and establish a session for it.
    pub async fn signup(&mut self, email: &str, password: &str) -> AuthOutcome {
        self.attempt(IdentityOp::SignupNewUser, email, password).await
    }

    async fn attempt(&mut self, op: IdentityOp, email: &str, password: &str) -> AuthOutcome {
        if email.is_empty() || password.is_empty() {
            self.state
                .apply(Transition::Failed(MISSING_CREDENTIALS_MESSAGE.to_string()));
            return AuthOutcome::Failed;
        }

        self.state.apply(Transition::AttemptStarted);

        match self.provider.authenticate(op, email, password).await {
            Ok(data) => self.commit(data),
            Err(e) => self.fail(e),
        }
    }

    /// Establish a session from a successful identity response. The timer is
    /// armed before the state commits so an authenticated session can never
    /// exist without a bounded lifetime.
    fn commit(&mut self, data: AuthResponseData) -> AuthOutcome {
        let expires_in = match data.expires_in_seconds() {
            Ok(seconds) => seconds,
            Err(e) => return self.fail(e),
        };

        let expires_at = Utc::now() + Duration::seconds(expires_in);
        let session = Session::new(data.email, data.local_id, data.id_token, expires_at);

        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "Failed to persist credential");
        }

        // Fresh generation for the new session; an expiry already queued by
        // a replaced session must not tear this one down.
        self.generation = self.generation.wrapping_add(1);
        self.arm_for(StdDuration::from_secs(expires_in.max(0) as u64));
        info!(email = %session.email, "Session established");
        self.state.apply(Transition::Authenticated(session));
        AuthOutcome::Authenticated { redirect: true }
    }

    fn fail(&mut self, error: AuthError) -> AuthOutcome {
        warn!(error = %error, "Authentication failed");
        self.state
            .apply(Transition::Failed(error.user_message().to_string()));
        AuthOutcome::Failed
    }

    /// Re-establish a session from the credential store, issued once at
    /// application start.
    ///
    /// An absent, empty, or already-expired record is a no-op: the state is
    /// left untouched and a stale record stays on disk until the next
    /// explicit logout overwrites it.
    pub fn restore(&mut self) -> AuthOutcome {
        let Some(record) = self.store.load() else {
            return AuthOutcome::NoSession;
        };

        let session: Session = record.into();
        if session.token().is_none() {
            debug!("Persisted credential empty or expired, skipping restore");
            return AuthOutcome::NoSession;
        }

        let remaining = session.time_until_expiry().to_std().unwrap_or_default();
        self.generation = self.generation.wrapping_add(1);
        self.arm_for(remaining);
        info!(email = %session.email, "Session restored");
        self.state.apply(Transition::Authenticated(session));
        AuthOutcome::Authenticated { redirect: false }
    }

    /// End the session on user request.
    pub fn logout(&mut self) -> AuthOutcome {
        self.end_session();
        info!("Logged out");
        AuthOutcome::LoggedOut
    }

    /// Drop a displayed error after the UI has shown it once.
    pub fn clear_error(&mut self) {
        self.state.apply(Transition::ErrorCleared);
    }

    /// Drain the expiry channel. Host loops call this each tick; a fired
    /// schedule from the current generation ends the session exactly like a
    /// logout, while schedules that outlived their session are discarded.
    pub fn poll_expiry(&mut self) -> Option<AuthOutcome> {
        loop {
            match self.expiry_rx.try_recv() {
                Ok(expired) if expired.generation == self.generation => {
                    info!("Session token expired");
                    self.end_session();
                    return Some(AuthOutcome::Expired);
                }
                Ok(expired) => {
                    debug!(generation = expired.generation, "Discarding stale expiration");
                }
                Err(_) => return None,
            }
        }
    }

    fn end_session(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.timer.disarm();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted credential");
        }
        self.state.apply(Transition::LoggedOut);
    }

    fn arm_for(&mut self, duration: StdDuration) {
        self.timer
            .arm(duration, self.generation, self.expiry_tx.clone());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;
    use tokio::time::advance;

    struct FakeProvider {
        responses: RefCell<VecDeque<Result<AuthResponseData, AuthError>>>,
        calls: RefCell<Vec<(IdentityOp, String)>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                responses: RefCell::new(VecDeque::new()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn respond_with(self, response: Result<AuthResponseData, AuthError>) -> Self {
            self.responses.borrow_mut().push_back(response);
            self
        }
    }

    impl IdentityProvider for FakeProvider {
        async fn authenticate(
            &self,
            op: IdentityOp,
            email: &str,
            _password: &str,
        ) -> Result<AuthResponseData, AuthError> {
            self.calls.borrow_mut().push((op, email.to_string()));
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(AuthError::InvalidResponse("unscripted call".to_string())))
        }
    }

    fn token_response(token: &str, user_id: &str, expires_in: &str) -> AuthResponseData {
        AuthResponseData {
            id_token: token.to_string(),
            email: "a@b.com".to_string(),
            refresh_token: "R1".to_string(),
            expires_in: expires_in.to_string(),
            local_id: user_id.to_string(),
            registered: None,
        }
    }

    fn orchestrator(provider: FakeProvider) -> (TempDir, AuthOrchestrator<FakeProvider>) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());
        (dir, AuthOrchestrator::new(provider, store))
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_login_success_establishes_session() {
        let provider = FakeProvider::new().respond_with(Ok(token_response("T1", "U1", "3600")));
        let (_dir, mut orch) = orchestrator(provider);

        let before = Utc::now();
        let outcome = orch.login("a@b.com", "pw").await;
        assert_eq!(outcome, AuthOutcome::Authenticated { redirect: true });

        let user = orch.state().user.as_ref().unwrap();
        assert_eq!(user.token, "T1");
        assert_eq!(user.user_id, "U1");
        assert_eq!(user.email, "a@b.com");

        let expected = before + Duration::seconds(3600);
        let skew = (user.expires_at - expected).num_seconds().abs();
        assert!(skew <= 5, "expires_at off by {skew}s");

        assert!(!orch.state().loading);
        assert!(orch.state().auth_error.is_none());
        assert!(orch.timer.is_armed());

        // Persisted record matches the in-memory session.
        let restored: Session = orch.store.load().unwrap().into();
        assert_eq!(&restored, user);
    }

    #[tokio::test]
    async fn test_login_failure_maps_taxonomy_message() {
        let provider = FakeProvider::new()
            .respond_with(Err(AuthError::Remote("INVALID_PASSWORD".to_string())));
        let (_dir, mut orch) = orchestrator(provider);

        let outcome = orch.login("a@b.com", "wrong").await;
        assert_eq!(outcome, AuthOutcome::Failed);
        assert!(orch.state().user.is_none());
        assert!(!orch.state().loading);
        assert_eq!(
            orch.state().auth_error.as_deref(),
            Some("This password is not correct.")
        );

        // No storage write, no timer.
        assert!(orch.store.load().is_none());
        assert!(!orch.timer.is_armed());
    }

    #[tokio::test]
    async fn test_unmapped_code_yields_default_message() {
        let provider = FakeProvider::new()
            .respond_with(Err(AuthError::Remote("USER_DISABLED".to_string())));
        let (_dir, mut orch) = orchestrator(provider);

        orch.login("a@b.com", "pw").await;
        assert_eq!(
            orch.state().auth_error.as_deref(),
            Some("An unknown error occurred!")
        );
    }

    #[tokio::test]
    async fn test_signup_uses_signup_operation() {
        let provider = FakeProvider::new().respond_with(Ok(token_response("T2", "U2", "3600")));
        let (_dir, mut orch) = orchestrator(provider);

        let outcome = orch.signup("new@b.com", "pw").await;
        assert_eq!(outcome, AuthOutcome::Authenticated { redirect: true });
        assert_eq!(
            orch.provider.calls.borrow().as_slice(),
            &[(IdentityOp::SignupNewUser, "new@b.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_signup_existing_email_message() {
        let provider =
            FakeProvider::new().respond_with(Err(AuthError::Remote("EMAIL_EXISTS".to_string())));
        let (_dir, mut orch) = orchestrator(provider);

        orch.signup("a@b.com", "pw").await;
        assert_eq!(
            orch.state().auth_error.as_deref(),
            Some("This email exists already")
        );
    }

    #[tokio::test]
    async fn test_blank_credentials_never_reach_the_endpoint() {
        let (_dir, mut orch) = orchestrator(FakeProvider::new());

        let outcome = orch.login("", "pw").await;
        assert_eq!(outcome, AuthOutcome::Failed);
        assert_eq!(
            orch.state().auth_error.as_deref(),
            Some("Email and password are required.")
        );
        assert!(orch.provider.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_expires_in_fails_with_default_message() {
        let provider = FakeProvider::new().respond_with(Ok(token_response("T1", "U1", "soon")));
        let (_dir, mut orch) = orchestrator(provider);

        let outcome = orch.login("a@b.com", "pw").await;
        assert_eq!(outcome, AuthOutcome::Failed);
        assert_eq!(
            orch.state().auth_error.as_deref(),
            Some("An unknown error occurred!")
        );
        assert!(!orch.timer.is_armed());
    }

    #[tokio::test]
    async fn test_restore_without_record_is_a_noop() {
        let (_dir, mut orch) = orchestrator(FakeProvider::new());

        let outcome = orch.restore();
        assert_eq!(outcome, AuthOutcome::NoSession);
        assert_eq!(orch.state(), &AuthState::default());
    }

    #[tokio::test]
    async fn test_restore_with_empty_token_is_a_noop() {
        let (dir, mut orch) = orchestrator(FakeProvider::new());
        let session = Session::new("a@b.com", "U1", "", Utc::now() + Duration::hours(1));
        orch.store.save(&session).unwrap();

        let outcome = orch.restore();
        assert_eq!(outcome, AuthOutcome::NoSession);
        assert_eq!(orch.state(), &AuthState::default());
        // The unusable record is left on disk.
        assert!(dir.path().join("userData.json").exists());
    }

    #[tokio::test]
    async fn test_restore_with_expired_record_leaves_it_on_disk() {
        let (dir, mut orch) = orchestrator(FakeProvider::new());
        let session = Session::new("a@b.com", "U1", "T1", Utc::now() - Duration::minutes(5));
        orch.store.save(&session).unwrap();

        let outcome = orch.restore();
        assert_eq!(outcome, AuthOutcome::NoSession);
        assert_eq!(orch.state(), &AuthState::default());
        assert!(dir.path().join("userData.json").exists());
    }

    #[tokio::test]
    async fn test_restore_reestablishes_session_without_redirect() {
        let (_dir, mut orch) = orchestrator(FakeProvider::new());
        let session = Session::new("a@b.com", "U1", "T1", Utc::now() + Duration::hours(1));
        orch.store.save(&session).unwrap();

        let outcome = orch.restore();
        assert_eq!(outcome, AuthOutcome::Authenticated { redirect: false });
        assert_eq!(orch.state().user.as_ref(), Some(&session));
        assert!(orch.timer.is_armed());
    }

    #[tokio::test]
    async fn test_logout_clears_store_and_timer() {
        let provider = FakeProvider::new().respond_with(Ok(token_response("T1", "U1", "3600")));
        let (_dir, mut orch) = orchestrator(provider);
        orch.login("a@b.com", "pw").await;

        let outcome = orch.logout();
        assert_eq!(outcome, AuthOutcome::LoggedOut);
        assert!(orch.state().user.is_none());
        assert!(orch.store.load().is_none());
        assert!(!orch.timer.is_armed());
    }

    #[tokio::test]
    async fn test_logout_from_anonymous_state_is_safe() {
        let (_dir, mut orch) = orchestrator(FakeProvider::new());
        assert_eq!(orch.logout(), AuthOutcome::LoggedOut);
        assert!(orch.state().user.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_like_a_logout_exactly_once() {
        let provider = FakeProvider::new().respond_with(Ok(token_response("T1", "U1", "1")));
        let (_dir, mut orch) = orchestrator(provider);
        orch.login("a@b.com", "pw").await;
        settle().await;

        // Not before the token's full lifetime has passed.
        advance(std::time::Duration::from_millis(900)).await;
        settle().await;
        assert_eq!(orch.poll_expiry(), None);

        advance(std::time::Duration::from_millis(200)).await;
        settle().await;

        assert_eq!(orch.poll_expiry(), Some(AuthOutcome::Expired));
        assert!(orch.state().user.is_none());
        assert!(orch.store.load().is_none());

        // No second firing, however long we wait.
        advance(std::time::Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(orch.poll_expiry(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_armed_before_logout_is_discarded() {
        let provider = FakeProvider::new().respond_with(Ok(token_response("T1", "U1", "1")));
        let (_dir, mut orch) = orchestrator(provider);
        orch.login("a@b.com", "pw").await;
        settle().await;

        orch.logout();

        // Even if the old schedule had already fired into the channel, its
        // generation is stale by the time we drain it.
        advance(std::time::Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(orch.poll_expiry(), None);
    }

    #[tokio::test]
    async fn test_clear_error_after_display() {
        let provider = FakeProvider::new()
            .respond_with(Err(AuthError::Remote("EMAIL_NOT_FOUND".to_string())));
        let (_dir, mut orch) = orchestrator(provider);

        orch.login("a@b.com", "pw").await;
        assert_eq!(
            orch.state().auth_error.as_deref(),
            Some("This email does not exist.")
        );

        orch.clear_error();
        assert!(orch.state().auth_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_arms_timer_for_remaining_lifetime() {
        let (_dir, mut orch) = orchestrator(FakeProvider::new());
        let session = Session::new("a@b.com", "U1", "T1", Utc::now() + Duration::seconds(30));
        orch.store.save(&session).unwrap();

        assert_eq!(
            orch.restore(),
            AuthOutcome::Authenticated { redirect: false }
        );
        settle().await;

        // Just under the remaining lifetime: still logged in.
        advance(std::time::Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(orch.poll_expiry(), None);
        assert!(orch.state().user.is_some());

        // Just past it: the session ends.
        advance(std::time::Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(orch.poll_expiry(), Some(AuthOutcome::Expired));
        assert!(orch.state().user.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_expiry_from_replaced_session_is_discarded() {
        let provider = FakeProvider::new()
            .respond_with(Ok(token_response("T1", "U1", "1")))
            .respond_with(Ok(token_response("T2", "U2", "3600")));
        let (_dir, mut orch) = orchestrator(provider);
        orch.login("a@b.com", "pw").await;
        settle().await;

        // The first session's expiry lands in the channel before the
        // replacement login completes.
        advance(std::time::Duration::from_millis(1100)).await;
        settle().await;

        orch.login("a@b.com", "pw").await;
        settle().await;

        // Draining must not tear down the replacement session.
        assert_eq!(orch.poll_expiry(), None);
        let user = orch.state().user.as_ref().unwrap();
        assert_eq!(user.token, "T2");
        let stored: Session = orch.store.load().unwrap().into();
        assert_eq!(&stored, user);
        assert!(orch.timer.is_armed());
    }

    #[tokio::test]
    async fn test_new_login_replaces_previous_session() {
        let provider = FakeProvider::new()
            .respond_with(Ok(token_response("T1", "U1", "3600")))
            .respond_with(Ok(token_response("T2", "U2", "3600")));
        let (_dir, mut orch) = orchestrator(provider);

        orch.login("a@b.com", "pw").await;
        orch.login("a@b.com", "pw").await;

        let user = orch.state().user.as_ref().unwrap();
        assert_eq!(user.token, "T2");
        let restored: Session = orch.store.load().unwrap().into();
        assert_eq!(&restored, user);
    }
}
