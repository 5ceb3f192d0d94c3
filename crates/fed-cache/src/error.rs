//! Repository error types.

use std::fmt;

/// Repository operation errors.
#[derive(Debug)]
pub enum CacheError {
    /// Connection to the backend failed.
    Connection(String),
    /// Serialization/deserialization error.
    Serialization(String),
    /// The expiry passed to a write is not in the future.
    InvalidExpiry,
    /// Operation timed out.
    Timeout,
    /// Invalid configuration.
    Configuration(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "repository connection error: {msg}"),
            Self::Serialization(msg) => write!(f, "repository serialization error: {msg}"),
            Self::InvalidExpiry => write!(f, "expiry must be in the future"),
            Self::Timeout => write!(f, "repository operation timed out"),
            Self::Configuration(msg) => write!(f, "repository configuration error: {msg}"),
            Self::Internal(msg) => write!(f, "internal repository error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for repository operations.
pub type CacheResult<T> = Result<T, CacheError>;
