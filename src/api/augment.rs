//! Outbound request augmentation.
//!
//! Every HTTP request the surrounding application sends passes through here
//! before dispatch. The read is synchronous against the current state: a
//! request issued while a login is still pending goes out uncredentialed
//! rather than waiting.

use reqwest::RequestBuilder;

use crate::auth::AuthState;

/// Query parameter carrying the credential.
const AUTH_PARAM: &str = "auth";

/// Attach the current session's token to `request`, or return it unchanged
/// when no valid session is held.
pub fn with_auth(state: &AuthState, request: RequestBuilder) -> RequestBuilder {
    match state.user.as_ref().and_then(|user| user.token()) {
        Some(token) => request.query(&[(AUTH_PARAM, token)]),
        None => request,
    }
}

// ============================================================================
// Tests
// ============================================================================
