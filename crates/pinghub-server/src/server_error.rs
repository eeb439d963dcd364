//! Router error types.
//!
//! Two layers of failure exist at the router boundary:
//! - [`RouterError`]: process-level failures (an event referencing a session
//!   the runtime never registered). These indicate a runtime bug.
//! - [`EventError`]: per-event domain failures. These never escape the
//!   router; they become a scoped `error` event to the requester only.

use std::fmt;

use crate::storage::StoreError;

/// Process-level router failure.
#[derive(Debug)]
pub enum RouterError {
    /// Event referenced a session the router has never seen.
    ///
    /// The runtime registers every connection before forwarding its events,
    /// so this indicates a runtime bug, not client misbehavior.
    SessionNotFound(u64),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
        }
    }
}

impl std::error::Error for RouterError {}

/// Per-event domain failure, reported back to the requester only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Referenced message or group does not exist.
    NotFound(String),

    /// Requester is not allowed to perform the operation in this scope.
    AuthorizationDenied(String),

    /// Operation requires a bound identity and the session has none.
    AuthorizationRequired,

    /// Event payload failed a semantic check (empty text, bad field combo).
    Validation(String),

    /// Storage backend failed. Transient in steady state; the event is
    /// dropped and the client may retry.
    StoreUnavailable(String),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::AuthorizationDenied(why) => write!(f, "not authorized: {why}"),
            Self::AuthorizationRequired => write!(f, "not logged in"),
            Self::Validation(why) => write!(f, "invalid request: {why}"),
            Self::StoreUnavailable(why) => write!(f, "storage unavailable: {why}"),
        }
    }
}

impl std::error::Error for EventError {}

impl From<StoreError> for EventError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
