//! Error handling for the federation engine.
//!
//! Error messages are informative for operators but never carry NameID
//! values or session handles.

use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for engine assembly and lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failover repository error.
    #[error("repository error: {0}")]
    Repository(String),

    /// A collaborator (metadata, crypto, transport) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns whether the failed operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Repository(_) | Self::Collaborator(_))
    }
}
