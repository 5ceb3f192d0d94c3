//! Error type for collaborator calls.

use thiserror::Error;

/// Result type alias for port operations.
pub type SpiResult<T> = Result<T, SpiError>;

/// Error returned by a collaborator.
#[derive(Debug, Error)]
pub enum SpiError {
    /// The entity, session or key is unknown to the collaborator.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The operation is forbidden by configuration.
    #[error("policy violation: {0}")]
    Policy(String),

    /// Any other failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SpiError {
    /// Returns true when the error means "absent" rather than "broken".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
