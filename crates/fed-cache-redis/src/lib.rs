//! # fed-cache-redis
//!
//! Redis implementation of the failover token repository, using `fred`.
//!
//! ## Key layout
//!
//! - `<prefix>:token:<key>` holds the payload, with the entry's expiry as
//!   the Redis TTL
//! - `<prefix>:secondary:<secondary key>` is a set of token keys; members
//!   whose token has expired are pruned lazily on read and by
//!   `delete_expired`
//!
//! ## Example
//!
//! ```ignore
//! use fed_cache_redis::{RedisConfig, RedisTokenRepository};
//!
//! let config = RedisConfig::new()
//!     .url("redis://cache.internal:6379/0")
//!     .key_prefix("fed");
//! let repository = RedisTokenRepository::new(config).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod repository;

pub use config::RedisConfig;
pub use repository::RedisTokenRepository;
