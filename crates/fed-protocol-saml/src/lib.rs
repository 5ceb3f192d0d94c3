//! # fed-protocol-saml
//!
//! SAML 2.0 session federation and logout coordination.
//!
//! This crate holds the protocol logic of the federation engine:
//!
//! - **Single Logout fan-out** - Notify every SP of an IdP session and aggregate the outcome
//! - **ManageNameID** - Terminate or re-key a federation under its key lock
//! - **Artifact exchange** - Single-use, time-bounded response handles
//! - **Signature gate** - Verify inbound and sign outbound messages per metadata
//! - **Binding selection** - Pick endpoints with the logout fallback order
//!
//! # Architecture
//!
//! - [`types`] - Protocol messages and status codes
//! - [`engine`] - [`FederationEngine`], the caller-facing entry point
//! - [`logout`] / [`manage_name_id`] - The two coordinators
//! - [`artifact`] - Cache of artifact-bound and pending responses
//! - [`transport`] - Outbound delivery seam
//! - [`outcome`] - Terminal status taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use fed_protocol_saml::{FederationEngine, FederationRequest, ProtocolVerb};
//!
//! let engine = FederationEngine::new(config, ports, repository, accounts, transport);
//! let reply = engine
//!     .handle(FederationRequest::new(
//!         ProtocolVerb::LogoutRequest(request),
//!         EntityRole::IdentityProvider,
//!         "/idp",
//!     ))
//!     .await;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod binding;
pub mod engine;
pub mod error;
pub mod gate;
pub mod logout;
pub mod manage_name_id;
pub mod outcome;
pub mod transport;
pub mod types;

pub use artifact::{CachedExchange, ResponseCache, TimeBound};
pub use engine::{
    FederationEngine, FederationReply, FederationRequest, ProtocolVerb, ResponseBody,
    ResponseDelivery,
};
pub use error::{SamlError, SamlResult};
pub use gate::SignatureGate;
pub use logout::{
    FanoutOutcome, FanoutRequest, FanoutState, LogoutCoordinator, LogoutFanoutJob,
    TargetOutcome, TargetResult,
};
pub use manage_name_id::{ManageNameIdCoordinator, NameIdChange};
pub use outcome::FederationStatus;
pub use transport::{DispatchError, OutboundMessage, Transport};
pub use types::*;
