//! Session error types.

use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No IdP session exists for the session index.
    #[error("IdP session not found: {0}")]
    NotFound(String),

    /// The federation key is not held by the caller's lock guard.
    #[error("federation key not locked: {0}")]
    KeyNotLocked(String),

    /// Internal error.
    #[error("internal session error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Checks if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
