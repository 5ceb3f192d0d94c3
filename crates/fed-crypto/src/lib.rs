//! # fed-crypto
//!
//! Digests and random identifiers used by the federation engine.
//!
//! Signing, verification and XML encryption are not performed here; they
//! belong to the injected crypto service. This crate only derives stable
//! federation keys and generates identifiers that must be unguessable
//! (session indexes, message IDs, artifact handles).
//!
//! Digests use SHA-384; SHA-256 is not offered.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod hash;
pub mod random;

pub use hash::{federation_digest, sha384};
pub use random::{
    generate_artifact_handle, generate_message_id, generate_session_index, random_alphanumeric,
    random_base64url, random_bytes,
};
