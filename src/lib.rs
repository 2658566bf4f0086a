//! Session and authentication core for the recipeshelf recipe manager.
//!
//! The crate covers the full credential lifecycle: acquiring a token from
//! the remote identity endpoint, persisting it across restarts, expiring it
//! on schedule, and attaching it to outgoing requests. Recipe data, views,
//! and routing live outside; they dispatch lifecycle events into
//! [`auth::AuthOrchestrator`] and read [`auth::AuthState`] back.

pub mod api;
pub mod auth;
pub mod config;
