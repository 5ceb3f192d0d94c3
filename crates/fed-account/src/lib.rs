//! # fed-account
//!
//! Durable federation facts.
//!
//! - [`AccountFederationStore`] - the external store persisting
//!   `NameIdInfo` records per user, with an in-memory implementation
//! - [`FederationRecordStore`] - the engine's view over that store:
//!   one record per `(user, local entity, remote entity)`, affiliation
//!   membership checks, reverse lookup by federation key
//! - [`TransientNameIdCache`] - reverse lookup of transient NameIDs, which
//!   are never written to the account store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod store;
pub mod transient;

pub use backend::{AccountFederationStore, InMemoryAccountStore};
pub use error::{AccountError, AccountResult};
pub use store::FederationRecordStore;
pub use transient::TransientNameIdCache;
