//! Federation record store errors.

use fed_spi::SpiError;
use thiserror::Error;

/// Errors that can occur during federation record operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The requesting entity is not a member of the named affiliation.
    #[error("{entity} is not a member of affiliation {affiliation}")]
    NotAffiliationMember {
        /// Affiliation ID.
        affiliation: String,
        /// Entity that asked.
        entity: String,
    },

    /// The account federation store failed.
    #[error("account store error: {0}")]
    Backend(String),

    /// Metadata lookup failed.
    #[error("metadata error: {0}")]
    Metadata(#[from] SpiError),
}

impl AccountError {
    /// Checks if this error is a policy violation rather than a failure.
    #[must_use]
    pub const fn is_policy_violation(&self) -> bool {
        matches!(self, Self::NotAffiliationMember { .. })
    }
}

/// Result type for federation record operations.
pub type AccountResult<T> = Result<T, AccountError>;
