//! SAML Logout types.
//!
//! Single Logout (SLO) request message. The matching response is a
//! [`StatusResponse`](super::StatusResponse).

use chrono::{DateTime, Duration, Utc};
use fed_model::NameId;
use serde::{Deserialize, Serialize};

use super::{logout_reasons, Identifier, SAML_VERSION};
use crate::error::{SamlError, SamlResult};

/// SAML Logout Request.
///
/// A request to terminate an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the requester.
    pub issuer: String,

    /// The URL where this request was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The principal to log out.
    pub identifier: Identifier,

    /// Session indexes to terminate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_indexes: Vec<String>,

    /// Reason for the logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Time after which the request is no longer valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Signature over the rest of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,

    /// The RelayState parameter (not part of SAML but commonly used).
    #[serde(skip)]
    pub relay_state: Option<String>,
}

pub(crate) fn default_version() -> String {
    SAML_VERSION.to_string()
}

impl LogoutRequest {
    /// User logout reason.
    pub const REASON_USER: &'static str = logout_reasons::USER;

    /// Admin logout reason.
    pub const REASON_ADMIN: &'static str = logout_reasons::ADMIN;

    /// Creates a new logout request.
    #[must_use]
    pub fn new(issuer: impl Into<String>, name_id: NameId) -> Self {
        Self {
            id: fed_crypto::generate_message_id(),
            version: default_version(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            identifier: Identifier::NameId(name_id),
            session_indexes: Vec::new(),
            reason: None,
            not_on_or_after: None,
            signature: None,
            relay_state: None,
        }
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds a session index to terminate.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    /// Sets the logout reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, state: impl Into<String>) -> Self {
        self.relay_state = Some(state.into());
        self
    }

    /// Sets the validity period.
    #[must_use]
    pub fn valid_for(mut self, validity: Duration) -> Self {
        self.not_on_or_after = Some(self.issue_instant + validity);
        self
    }

    /// Validates the basic structure of this request.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] for a malformed request and
    /// [`SamlError::RequestExpired`] once `NotOnOrAfter` has passed.
    pub fn validate(&self) -> SamlResult<()> {
        if self.id.is_empty() {
            return Err(SamlError::InvalidRequest("ID is required".into()));
        }
        if self.version != SAML_VERSION {
            return Err(SamlError::InvalidRequest(format!(
                "unsupported SAML version: {}",
                self.version
            )));
        }
        if self.issuer.is_empty() {
            return Err(SamlError::InvalidRequest("Issuer is required".into()));
        }
        if let Identifier::NameId(name_id) = &self.identifier {
            if name_id.value.is_empty() {
                return Err(SamlError::InvalidRequest("NameID is required".into()));
            }
        }
        if self.is_expired() {
            return Err(SamlError::RequestExpired);
        }
        Ok(())
    }

    /// Checks if the request has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.not_on_or_after
            .is_some_and(|not_after| Utc::now() >= not_after)
    }
}
