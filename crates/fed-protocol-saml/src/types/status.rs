//! Status carried by logout and NameID management responses.

use serde::{Deserialize, Serialize};

use super::{status_codes, sub_status_codes};

/// A status code URI, optionally refined by a second-level code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// Status code URI.
    pub value: String,

    /// Second-level code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_status: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a top-level code without refinement.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_status: None,
        }
    }

    fn refined(value: &str, sub_status: &str) -> Self {
        Self {
            value: value.to_string(),
            sub_status: Some(Box::new(Self::new(sub_status))),
        }
    }

    /// Returns true for the top-level `Success` code, refined or not.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value == status_codes::SUCCESS
    }

    /// Returns the second-level code, if any.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.sub_status.as_deref().map(|s| s.value.as_str())
    }
}

/// Response status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Status code.
    pub status_code: StatusCode,

    /// Human readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    fn coded(status_code: StatusCode, message: Option<String>) -> Self {
        Self {
            status_code,
            status_message: message,
        }
    }

    /// Everything the request asked for was done.
    #[must_use]
    pub fn success() -> Self {
        Self::coded(StatusCode::new(status_codes::SUCCESS), None)
    }

    /// The request was at fault.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self::coded(StatusCode::new(status_codes::REQUESTER), Some(message.into()))
    }

    /// The responder failed to carry out a valid request.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self::coded(StatusCode::new(status_codes::RESPONDER), Some(message.into()))
    }

    /// No federation matches the principal named in the request.
    #[must_use]
    pub fn unknown_principal() -> Self {
        Self::coded(
            StatusCode::refined(status_codes::REQUESTER, sub_status_codes::UNKNOWN_PRINCIPAL),
            None,
        )
    }

    /// The local session ended but not every party confirmed it.
    ///
    /// The top-level code stays `Success`.
    #[must_use]
    pub fn partial_logout(message: impl Into<String>) -> Self {
        Self::coded(
            StatusCode::refined(status_codes::SUCCESS, sub_status_codes::PARTIAL_LOGOUT),
            Some(message.into()),
        )
    }

    /// Returns true if the top-level code is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Returns true for a partial logout.
    #[must_use]
    pub fn is_partial_logout(&self) -> bool {
        self.status_code.sub_status_value() == Some(sub_status_codes::PARTIAL_LOGOUT)
    }
}
