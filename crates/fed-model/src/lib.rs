//! # fed-model
//!
//! Domain types shared by the federation engine.
//!
//! - [`NameId`] and [`NameIdFormat`]: the federated subject identifier
//! - [`SamlBinding`], [`Endpoint`] and [`ServiceKind`]: where and how a
//!   remote party is reached
//! - [`NameIdInfo`] and [`FederationKey`]: the durable federation record
//!   and its reverse-lookup key

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod binding;
pub mod federation;
pub mod name_id;

pub use binding::{Endpoint, MessageKind, SamlBinding, ServiceKind};
pub use federation::{EntityRole, FederationKey, FederationRecord, NameIdInfo};
pub use name_id::{NameId, NameIdFormat};
