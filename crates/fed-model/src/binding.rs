//! Protocol bindings and metadata endpoints.

use serde::{Deserialize, Serialize};

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
    /// HTTP Artifact binding.
    HttpArtifact,
    /// SOAP binding.
    Soap,
    /// Reverse SOAP (PAOS) binding.
    Paos,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
            Self::Paos => "urn:oasis:names:tc:SAML:2.0:bindings:PAOS",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact" => Some(Self::HttpArtifact),
            "urn:oasis:names:tc:SAML:2.0:bindings:SOAP" => Some(Self::Soap),
            "urn:oasis:names:tc:SAML:2.0:bindings:PAOS" => Some(Self::Paos),
            _ => None,
        }
    }

    /// Returns true for back-channel bindings answered in the same exchange.
    #[must_use]
    pub const fn is_synchronous(&self) -> bool {
        matches!(self, Self::Soap | Self::Paos)
    }

    /// Returns true for bindings that travel through the user agent.
    #[must_use]
    pub const fn is_front_channel(&self) -> bool {
        matches!(self, Self::HttpPost | Self::HttpRedirect | Self::HttpArtifact)
    }
}

/// Protocol service an endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Single sign-on service.
    SingleSignOn,
    /// Single logout service.
    SingleLogout,
    /// Manage name identifier service.
    ManageNameId,
    /// Artifact resolution service.
    ArtifactResolution,
}

/// Protocol message kinds subject to signing and encryption policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// LogoutRequest.
    LogoutRequest,
    /// LogoutResponse.
    LogoutResponse,
    /// ManageNameIDRequest.
    ManageNameIdRequest,
    /// ManageNameIDResponse.
    ManageNameIdResponse,
    /// ArtifactResolve.
    ArtifactResolve,
}

/// A service endpoint declared in a remote party's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Binding the endpoint accepts.
    pub binding: SamlBinding,
    /// Location requests are sent to.
    pub location: String,
    /// Location responses are sent to, when different from `location`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_location: Option<String>,
    /// Whether the endpoint is flagged as the default one.
    #[serde(default)]
    pub is_default: bool,
    /// Endpoint index, for indexed endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u16>,
}

impl Endpoint {
    /// Creates a new endpoint.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>) -> Self {
        Self {
            binding,
            location: location.into(),
            response_location: None,
            is_default: false,
            index: None,
        }
    }

    /// Marks the endpoint as default.
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Sets the response location.
    #[must_use]
    pub fn with_response_location(mut self, location: impl Into<String>) -> Self {
        self.response_location = Some(location.into());
        self
    }

    /// Returns where a response to a request received on this endpoint goes.
    #[must_use]
    pub fn response_target(&self) -> &str {
        self.response_location.as_deref().unwrap_or(&self.location)
    }
}
