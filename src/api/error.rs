use thiserror::Error;

/// Fallback shown for any code outside the taxonomy, malformed bodies, and
/// transport failures.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred!";

/// Identity endpoint failure modes.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The endpoint answered with a structured error envelope; the payload
    /// is the raw `error.message` code.
    #[error("Identity provider rejected the request: {0}")]
    Remote(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// User-facing message for a remote error code. Codes outside the table fall
/// through to the default.
fn message_for_code(code: &str) -> &'static str {
    match code {
        "EMAIL_EXISTS" => "This email exists already",
        "EMAIL_NOT_FOUND" => "This email does not exist.",
        "INVALID_PASSWORD" => "This password is not correct.",
        _ => UNKNOWN_ERROR_MESSAGE,
    }
}

impl AuthError {
    /// Map this failure to the message shown to the user. Transport failures
    /// and malformed bodies are deliberately indistinct from unmapped codes.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::Remote(code) => message_for_code(code),
            AuthError::Network(_) | AuthError::InvalidResponse(_) => UNKNOWN_ERROR_MESSAGE,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
