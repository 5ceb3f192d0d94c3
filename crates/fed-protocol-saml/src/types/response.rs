//! SAML status responses.
//!
//! `LogoutResponse` and `ManageNameIDResponse` share one shape: an issuer,
//! the request they answer and a status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::logout::default_version;
use super::{Status, SAML_VERSION};
use crate::error::{SamlError, SamlResult};

/// Response to a logout or NameID management request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the responder.
    pub issuer: String,

    /// The ID of the request this response is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// Signature over the rest of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,

    /// The RelayState parameter (not part of SAML but commonly used).
    #[serde(skip)]
    pub relay_state: Option<String>,
}

/// SAML Logout Response.
pub type LogoutResponse = StatusResponse;

/// SAML ManageNameID Response.
pub type ManageNameIdResponse = StatusResponse;

impl StatusResponse {
    /// Creates a response with the given status.
    #[must_use]
    pub fn new(issuer: impl Into<String>, status: Status) -> Self {
        Self {
            id: fed_crypto::generate_message_id(),
            version: default_version(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            in_response_to: None,
            destination: None,
            status,
            signature: None,
            relay_state: None,
        }
    }

    /// Creates a new success response.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self::new(issuer, Status::success())
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, state: impl Into<String>) -> Self {
        self.relay_state = Some(state.into());
        self
    }

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Validates the basic structure of this response.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidResponse`] for a malformed response.
    pub fn validate(&self) -> SamlResult<()> {
        if self.id.is_empty() {
            return Err(SamlError::InvalidResponse("ID is required".into()));
        }
        if self.version != SAML_VERSION {
            return Err(SamlError::InvalidResponse(format!(
                "unsupported SAML version: {}",
                self.version
            )));
        }
        if self.issuer.is_empty() {
            return Err(SamlError::InvalidResponse("Issuer is required".into()));
        }
        Ok(())
    }
}
