//! Repository selection.
//!
//! The failover repository is Redis when a URL is configured and an
//! in-process map otherwise. A single node runs fine on the latter; a
//! cluster needs the former so artifacts and session snapshots survive
//! the node that created them.

use std::sync::Arc;

use fed_cache::{InMemoryTokenRepository, TokenRepository};
use fed_cache_redis::{RedisConfig, RedisTokenRepository};
use fed_core::config::RepositoryConfig;

/// Default Redis key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "fed";

/// Creates the failover repository described by `config`.
///
/// ## Errors
///
/// Fails if Redis is configured but cannot be reached.
pub async fn token_repository(config: &RepositoryConfig) -> anyhow::Result<Arc<dyn TokenRepository>> {
    match &config.redis_url {
        Some(url) => {
            let prefix = config.key_prefix.as_deref().unwrap_or(DEFAULT_KEY_PREFIX);
            let redis = RedisConfig::new().url(url).key_prefix(prefix);
            let repository = RedisTokenRepository::new(redis).await?;
            tracing::info!(prefix = %prefix, "using Redis failover repository");
            Ok(Arc::new(repository))
        }
        None => {
            tracing::info!("using in-memory failover repository");
            Ok(Arc::new(InMemoryTokenRepository::new()))
        }
    }
}
