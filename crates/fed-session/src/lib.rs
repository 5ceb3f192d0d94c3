//! # fed-session
//!
//! Session state of the federation engine.
//!
//! - [`IdpSession`] - one local session as known to a hosted IdP, with the
//!   `(NameID, SP)` pairs it is federated with
//! - [`SessionIndexCache`] - the in-memory owner of IdP sessions, serialized
//!   per session index and mirrored into the failover repository
//! - [`SpSessionBindings`] - on a hosted SP, the local sessions sharing
//!   one federated identity, keyed by federation key

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod idp_session;
pub mod index_cache;
pub mod sp_binding;

pub use error::{SessionError, SessionResult};
pub use idp_session::{IdpSession, NameIdPair};
pub use index_cache::{LockedSession, PairRemoval, SessionIndexCache};
pub use sp_binding::{BindingGuard, SpSession, SpSessionBindings};

/// Local session property holding the IdP session index.
pub const IDP_SESSION_INDEX_PROPERTY: &str = "fed.idp.session_index";

/// Local session property holding the session index issued by the remote IdP.
pub const SP_SESSION_INDEX_PROPERTY: &str = "fed.sp.session_index";
