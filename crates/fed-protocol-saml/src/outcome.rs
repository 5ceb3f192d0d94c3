//! Terminal status of every coordinator operation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SamlError;
use crate::types::Status;

/// Outcome of a logout, NameID management or artifact operation.
///
/// Expected conditions end here instead of as an `Err`; callers map the
/// outcome onto the response they send back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FederationStatus {
    /// Every step succeeded.
    Success,
    /// The request was malformed, unsigned or not allowed. Nothing changed.
    RequesterError {
        /// Why the request was rejected.
        reason: String,
    },
    /// Internal failure; the caller may retry.
    ResponderError {
        /// What failed.
        reason: String,
    },
    /// The request was valid but no federation matched it.
    UnknownPrincipal,
    /// Local state was torn down but some remote parties did not confirm.
    PartialFailure {
        /// Entity IDs of the parties that failed or timed out.
        failed: Vec<String>,
    },
}

impl FederationStatus {
    /// Returns true for [`FederationStatus::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ResponderError { .. })
    }

    /// Maps the outcome onto a SAML status.
    #[must_use]
    pub fn to_status(&self) -> Status {
        match self {
            Self::Success => Status::success(),
            Self::RequesterError { reason } => Status::requester_error(reason.clone()),
            Self::ResponderError { reason } => Status::responder_error(reason.clone()),
            Self::UnknownPrincipal => Status::unknown_principal(),
            Self::PartialFailure { failed } => Status::partial_logout(format!(
                "logout not confirmed by {}",
                failed.join(", ")
            )),
        }
    }

    /// Combines the outcomes of several fan-outs answering one request.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::PartialFailure { mut failed }, Self::PartialFailure { failed: more }) => {
                failed.extend(more);
                Self::PartialFailure { failed }
            }
            (partial @ Self::PartialFailure { .. }, Self::Success)
            | (Self::Success, partial @ Self::PartialFailure { .. }) => partial,
            (Self::Success, Self::Success) => Self::Success,
            (Self::Success | Self::PartialFailure { .. }, other)
            | (other, Self::Success | Self::PartialFailure { .. }) => other,
            (first, _) => first,
        }
    }
}

impl From<&SamlError> for FederationStatus {
    fn from(err: &SamlError) -> Self {
        match err {
            SamlError::UnknownPrincipal(_) => Self::UnknownPrincipal,
            e if e.is_requester_error() => Self::RequesterError {
                reason: e.to_string(),
            },
            e => Self::ResponderError {
                reason: e.to_string(),
            },
        }
    }
}

impl From<SamlError> for FederationStatus {
    fn from(err: SamlError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for FederationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::RequesterError { reason } => write!(f, "requester error: {reason}"),
            Self::ResponderError { reason } => write!(f, "responder error: {reason}"),
            Self::UnknownPrincipal => f.write_str("unknown principal"),
            Self::PartialFailure { failed } => {
                write!(f, "partial failure ({} failed)", failed.len())
            }
        }
    }
}
