//! Transport port.
//!
//! The engine decides which binding and which endpoint a message uses;
//! encoding the message for that binding and moving it is the transport's
//! job.

use async_trait::async_trait;
use fed_model::SamlBinding;
use thiserror::Error;

use crate::types::SamlMessage;

/// A message ready to be sent to a remote party.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Binding to encode the message with.
    pub binding: SamlBinding,
    /// Endpoint URL.
    pub destination: String,
    /// The message.
    pub message: SamlMessage,
    /// Relay state to carry along front-channel bindings.
    pub relay_state: Option<String>,
}

/// Dispatch failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The endpoint could not be reached.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The remote party refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The transport cannot send over this binding.
    #[error("binding not supported by transport: {0:?}")]
    UnsupportedBinding(SamlBinding),
}

/// Sends protocol messages to remote parties.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message.
    ///
    /// Returns the response for exchanges that produce one in-line (SOAP,
    /// or a front-channel round trip the transport completes), `None`
    /// when the message was handed off without an answer.
    async fn dispatch(&self, outbound: OutboundMessage) -> Result<Option<SamlMessage>, DispatchError>;
}
