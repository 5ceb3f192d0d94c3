//! # fed-cache
//!
//! Failover token repository used to replicate ephemeral federation state
//! (session snapshots, cached protocol responses) across cluster nodes.
//!
//! The repository is a consistency aid: callers keep their own in-memory
//! state authoritative and treat repository failures as non-fatal.
//!
//! - [`TokenRepository`] - put/get/delete with expiry and an optional
//!   secondary key
//! - [`TokenRepositoryExt`] - JSON helpers over any repository
//! - [`InMemoryTokenRepository`] - single-node implementation
//!
//! A Redis implementation lives in `fed-cache-redis`.
//!
//! ## Example
//!
//! ```ignore
//! use fed_cache::{CacheResult, TokenRepositoryExt};
//!
//! async fn mirror(repo: &dyn TokenRepository, snapshot: &Snapshot) -> CacheResult<()> {
//!     repo.save_json(&snapshot.index, None, snapshot, snapshot.expires_at).await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod repository;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryTokenRepository;
pub use repository::{TokenRepository, TokenRepositoryExt};
