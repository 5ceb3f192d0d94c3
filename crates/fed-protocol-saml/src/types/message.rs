//! Protocol messages exchanged with remote parties.

use chrono::{DateTime, Utc};
use fed_model::MessageKind;
use serde::{Deserialize, Serialize};

use super::{LogoutRequest, ManageNameIdRequest, StatusResponse};
use crate::error::SamlResult;

/// A message that can carry a signature.
///
/// The signed bytes are the message serialized without its signature.
pub trait SignedMessage: Serialize + Clone {
    /// Returns the issuer entity ID.
    fn issuer(&self) -> &str;

    /// Returns the signature, if any.
    fn signature(&self) -> Option<&[u8]>;

    /// Replaces the signature.
    fn set_signature(&mut self, signature: Option<Vec<u8>>);

    /// Returns the bytes a signature covers.
    fn signing_input(&self) -> SamlResult<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.set_signature(None);
        Ok(serde_json::to_vec(&unsigned)?)
    }
}

macro_rules! signed_message {
    ($ty:ty) => {
        impl SignedMessage for $ty {
            fn issuer(&self) -> &str {
                &self.issuer
            }

            fn signature(&self) -> Option<&[u8]> {
                self.signature.as_deref()
            }

            fn set_signature(&mut self, signature: Option<Vec<u8>>) {
                self.signature = signature;
            }
        }
    };
}

signed_message!(LogoutRequest);
signed_message!(ManageNameIdRequest);
signed_message!(StatusResponse);

/// Any message the engine sends or receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum SamlMessage {
    /// Logout request.
    LogoutRequest(LogoutRequest),
    /// Logout response.
    LogoutResponse(StatusResponse),
    /// ManageNameID request.
    ManageNameIdRequest(ManageNameIdRequest),
    /// ManageNameID response.
    ManageNameIdResponse(StatusResponse),
}

impl SamlMessage {
    /// Returns the message kind used for policy lookups.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::LogoutRequest(_) => MessageKind::LogoutRequest,
            Self::LogoutResponse(_) => MessageKind::LogoutResponse,
            Self::ManageNameIdRequest(_) => MessageKind::ManageNameIdRequest,
            Self::ManageNameIdResponse(_) => MessageKind::ManageNameIdResponse,
        }
    }

    /// Returns the message ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::LogoutRequest(m) => &m.id,
            Self::ManageNameIdRequest(m) => &m.id,
            Self::LogoutResponse(m) | Self::ManageNameIdResponse(m) => &m.id,
        }
    }

    /// Returns the issuer entity ID.
    #[must_use]
    pub fn issuer(&self) -> &str {
        match self {
            Self::LogoutRequest(m) => &m.issuer,
            Self::ManageNameIdRequest(m) => &m.issuer,
            Self::LogoutResponse(m) | Self::ManageNameIdResponse(m) => &m.issuer,
        }
    }

    /// Returns the end of the message's validity window, if it has one.
    #[must_use]
    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::LogoutRequest(m) => m.not_on_or_after,
            _ => None,
        }
    }

    /// Returns the response, if this is a status response.
    #[must_use]
    pub const fn as_status_response(&self) -> Option<&StatusResponse> {
        match self {
            Self::LogoutResponse(m) | Self::ManageNameIdResponse(m) => Some(m),
            _ => None,
        }
    }
}
