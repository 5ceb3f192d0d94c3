//! SAML error types.
//!
//! Provides error types for logout, NameID management and artifact
//! operations, and their mapping onto SAML status codes.

use fed_account::AccountError;
use fed_cache::CacheError;
use fed_session::SessionError;
use fed_spi::SpiError;
use thiserror::Error;

use crate::transport::DispatchError;
use crate::types::{status_codes, sub_status_codes};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid SAML response format or content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Request is past its `NotOnOrAfter`.
    #[error("request expired")]
    RequestExpired,

    /// Signature missing or not valid.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// Signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// The requester is not allowed to act on this federation.
    #[error("request denied: {0}")]
    RequestDenied(String),

    /// No federation matches the request.
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Meta alias or entity not configured.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The operation is not available for this role or binding.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// No usable endpoint for a remote party.
    #[error("no {service} endpoint for {entity}")]
    NoEndpoint {
        /// Remote entity ID.
        entity: String,
        /// Service looked up.
        service: String,
    },

    /// A message could not be delivered.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// A payload was cached with an expiry that already passed.
    #[error("payload already expired")]
    ExpiredPayload,

    /// Encryption or decryption error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Metadata lookup failed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Storage operation error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the SAML status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_)
            | Self::RequestExpired
            | Self::SignatureInvalid(_)
            | Self::RequestDenied(_)
            | Self::UnknownPrincipal(_)
            | Self::Unsupported(_) => status_codes::REQUESTER,
            _ => status_codes::RESPONDER,
        }
    }

    /// Returns a sub-status code if applicable.
    #[must_use]
    pub fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::UnknownPrincipal(_) => Some(sub_status_codes::UNKNOWN_PRINCIPAL),
            Self::RequestDenied(_) => Some(sub_status_codes::REQUEST_DENIED),
            Self::Unsupported(_) => Some(sub_status_codes::REQUEST_UNSUPPORTED),
            Self::NoEndpoint { .. } => Some(sub_status_codes::UNSUPPORTED_BINDING),
            _ => None,
        }
    }

    /// Returns true if the request itself was at fault.
    #[must_use]
    pub fn is_requester_error(&self) -> bool {
        self.status_code() == status_codes::REQUESTER
    }
}

impl From<SpiError> for SamlError {
    fn from(err: SpiError) -> Self {
        match err {
            SpiError::NotFound(what) => Self::UnknownEntity(what),
            SpiError::Policy(msg) => Self::RequestDenied(msg),
            other => Self::Metadata(other.to_string()),
        }
    }
}

impl From<AccountError> for SamlError {
    fn from(err: AccountError) -> Self {
        if err.is_policy_violation() {
            return Self::RequestDenied(err.to_string());
        }
        match err {
            AccountError::Metadata(e) => e.into(),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<SessionError> for SamlError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(idx) => Self::UnknownPrincipal(format!("session {idx}")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for SamlError {
    fn from(err: CacheError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<DispatchError> for SamlError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err.to_string())
    }
}

impl From<serde_json::Error> for SamlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
