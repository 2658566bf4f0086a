//! Client for the remote identity endpoint.
//!
//! Two operations exist: verifying an existing account's password and
//! creating a new account. Both take the same credentials payload and answer
//! with the same token envelope, so they share one request path.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::AuthError;

/// Base URL for the identity provider's token endpoints.
const IDENTITY_BASE_URL: &str = "https://www.googleapis.com/identitytoolkit/v3/relyingparty";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum length of a response body quoted in an error.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// The two remote operations the identity endpoint offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOp {
    VerifyPassword,
    SignupNewUser,
}

impl IdentityOp {
    pub fn path(self) -> &'static str {
        match self {
            IdentityOp::VerifyPassword => "verifyPassword",
            IdentityOp::SignupNewUser => "signupNewUser",
        }
    }
}

#[derive(Debug, Serialize)]
struct CredentialsPayload<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "returnSecureToken")]
    return_secure_token: bool,
}

/// Successful token response from the identity endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponseData {
    #[serde(rename = "idToken")]
    pub id_token: String,
    pub email: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    /// Token lifetime in seconds, transported as a decimal string.
    #[serde(rename = "expiresIn")]
    pub expires_in: String,
    #[serde(rename = "localId")]
    pub local_id: String,
    /// Present on verify responses for accounts that already existed.
    #[serde(default)]
    pub registered: Option<bool>,
}

impl AuthResponseData {
    /// Parse the string-typed `expiresIn` field. A non-numeric value is a
    /// malformed body, not a mapped error code.
    pub fn expires_in_seconds(&self) -> Result<i64, AuthError> {
        self.expires_in.parse().map_err(|_| {
            AuthError::InvalidResponse(format!("expiresIn is not a number: {}", self.expires_in))
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Seam between the orchestrator and the network, so lifecycle logic is
/// testable against a scripted provider.
#[allow(async_fn_in_trait)] // futures are awaited in place, never spawned
pub trait IdentityProvider {
    async fn authenticate(
        &self,
        op: IdentityOp,
        email: &str,
        password: &str,
    ) -> Result<AuthResponseData, AuthError>;
}

/// Production identity client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl IdentityClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(IDENTITY_BASE_URL, api_key)
    }

    /// Point the client at a different endpoint (self-hosted emulators).
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, op: IdentityOp) -> String {
        format!("{}/{}?key={}", self.base_url, op.path(), self.api_key)
    }

    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            // Back off to a char boundary; a multibyte character may
            // straddle the cutoff.
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }
}

impl IdentityProvider for IdentityClient {
    async fn authenticate(
        &self,
        op: IdentityOp,
        email: &str,
        password: &str,
    ) -> Result<AuthResponseData, AuthError> {
        debug!(op = op.path(), "Dispatching identity request");

        let response = self
            .client
            .post(self.endpoint(op))
            .json(&CredentialsPayload {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        if response.status().is_success() {
            response
                .json::<AuthResponseData>()
                .await
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => Err(AuthError::Remote(envelope.error.message)),
                Err(_) => Err(AuthError::InvalidResponse(Self::truncate_body(&body))),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
