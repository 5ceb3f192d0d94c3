//! SAML ManageNameID request.

use chrono::{DateTime, Utc};
use fed_model::NameId;
use serde::{Deserialize, Serialize};

use super::logout::default_version;
use super::{Identifier, SAML_VERSION};
use crate::error::{SamlError, SamlResult};

/// What a ManageNameID request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameIdAction {
    /// End the federation.
    Terminate,
    /// Replace the NameID value.
    NewId(String),
    /// Replace the NameID value with an encrypted new value.
    NewEncryptedId(Vec<u8>),
}

/// SAML ManageNameID Request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageNameIdRequest {
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

    /// The federated identifier the request applies to.
    pub identifier: Identifier,

    /// Requested change.
    pub action: NameIdAction,

    /// Signature over the rest of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

impl ManageNameIdRequest {
    /// Creates a termination request.
    #[must_use]
    pub fn terminate(issuer: impl Into<String>, name_id: NameId) -> Self {
        Self::new(issuer, name_id, NameIdAction::Terminate)
    }

    /// Creates a re-key request.
    #[must_use]
    pub fn new_id(issuer: impl Into<String>, name_id: NameId, new_id: impl Into<String>) -> Self {
        Self::new(issuer, name_id, NameIdAction::NewId(new_id.into()))
    }

    fn new(issuer: impl Into<String>, name_id: NameId, action: NameIdAction) -> Self {
        Self {
            id: fed_crypto::generate_message_id(),
            version: default_version(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            identifier: Identifier::NameId(name_id),
            action,
            signature: None,
        }
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Returns true for a termination request.
    #[must_use]
    pub const fn is_terminate(&self) -> bool {
        matches!(self.action, NameIdAction::Terminate)
    }

    /// Validates the basic structure of this request.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] for a malformed request.
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
        if matches!(&self.action, NameIdAction::NewId(v) if v.is_empty()) {
            return Err(SamlError::InvalidRequest("NewID must not be empty".into()));
        }
        Ok(())
    }
}
