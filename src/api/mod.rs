//! Identity endpoint client, error taxonomy, and request augmentation.

pub mod augment;
pub mod error;
pub mod identity;

pub use augment::with_auth;
pub use error::{AuthError, UNKNOWN_ERROR_MESSAGE};
pub use identity::{AuthResponseData, IdentityClient, IdentityOp, IdentityProvider};
