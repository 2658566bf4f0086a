//! Session lifecycle: state machine, durable credential, expiration timer,
//! and the orchestrator that ties them together.
//!
//! External collaborators dispatch lifecycle events into
//! [`AuthOrchestrator`] and read the resulting [`AuthState`]; nothing else
//! writes session state.

pub mod orchestrator;
pub mod session;
pub mod store;
pub mod timer;

pub use orchestrator::{AuthOrchestrator, AuthOutcome};
pub use session::{AuthState, Session, Transition};
pub use store::{CredentialStore, PersistedCredential};
pub use timer::{ExpirationTimer, Expired};
