//! Redis token repository implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fed_cache::{CacheError, CacheResult, TokenRepository};
use fred::prelude::*;
use fred::types::config::{ConnectionConfig, PerformanceConfig};
use fred::types::scan::Scanner;
use futures::TryStreamExt;

use crate::config::RedisConfig;
use crate::error::from_redis_error;

/// Redis-based [`TokenRepository`].
pub struct RedisTokenRepository {
    client: Client,
    config: RedisConfig,
}

impl RedisTokenRepository {
    /// Connects to Redis.
    ///
    /// ## Errors
    ///
    /// Returns an error if the URL is invalid or the connection cannot be
    /// established.
    pub async fn new(config: RedisConfig) -> CacheResult<Self> {
        config.validate()?;
        let redis_config = Config::from_url(&config.url)
            .map_err(|e| CacheError::Configuration(e.to_string()))?;

        let performance = PerformanceConfig {
            default_command_timeout: Duration::from_millis(config.command_timeout_ms),
            ..Default::default()
        };
        let connection = ConnectionConfig {
            connection_timeout: Duration::from_millis(config.connect_timeout_ms),
            ..Default::default()
        };

        let client = Client::new(
            redis_config,
            Some(performance),
            Some(connection),
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );

        client.init().await.map_err(from_redis_error)?;
        tracing::info!(prefix = %config.key_prefix, "connected to redis token repository");

        Ok(Self { client, config })
    }

    /// Returns the underlying Redis client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    fn token_key(&self, key: &str) -> String {
        self.config.token_key(key)
    }

    fn secondary_key(&self, key: &str) -> String {
        self.config.secondary_key(key)
    }

    /// Collects keys matching a scan pattern.
    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut scanner = self.client.scan(pattern, None, None);
        let mut keys = Vec::new();

        while let Some(result) = scanner.try_next().await.map_err(from_redis_error)? {
            if let Some(page) = result.results() {
                for value in page {
                    if let Some(s) = value.as_str() {
                        keys.push(s.to_string());
                    }
                }
            }
        }

        Ok(keys)
    }

    /// Removes set members whose token no longer exists.
    async fn prune_set(&self, set_key: &str) -> CacheResult<u64> {
        let members: Vec<String> = self
            .client
            .smembers(set_key)
            .await
            .map_err(from_redis_error)?;

        let mut pruned = 0;
        for member in members {
            let exists: i64 = self
                .client
                .exists(self.token_key(&member))
                .await
                .map_err(from_redis_error)?;
            if exists == 0 {
                self.client
                    .srem::<(), _, _>(set_key, member)
                    .await
                    .map_err(from_redis_error)?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

/// Seconds until `expires_at`, rounded up, or `None` if already past.
fn seconds_until(expires_at: DateTime<Utc>) -> Option<i64> {
    let millis = (expires_at - Utc::now()).num_milliseconds();
    (millis > 0).then(|| (millis + 999) / 1000)
}

#[async_trait]
impl TokenRepository for RedisTokenRepository {
    async fn save(
        &self,
        key: &str,
        secondary_key: Option<&str>,
        data: &str,
        expires_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        let seconds = seconds_until(expires_at).ok_or(CacheError::InvalidExpiry)?;
        let token_key = self.token_key(key);

        self.client
            .set::<(), _, _>(
                &token_key,
                data,
                Some(Expiration::EX(seconds)),
                None,
                false,
            )
            .await
            .map_err(from_redis_error)?;

        if let Some(secondary) = secondary_key {
            let set_key = self.secondary_key(secondary);
            self.client
                .sadd::<(), _, _>(&set_key, key)
                .await
                .map_err(from_redis_error)?;

            // The set lives as long as its longest-lived member.
            let current: i64 = self.client.ttl(&set_key).await.map_err(from_redis_error)?;
            if current < seconds {
                self.client
                    .expire::<(), _>(&set_key, seconds, None)
                    .await
                    .map_err(from_redis_error)?;
            }
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> CacheResult<Option<String>> {
        self.client
            .get(self.token_key(key))
            .await
            .map_err(from_redis_error)
    }

    async fn retrieve_by_secondary_key(&self, secondary_key: &str) -> CacheResult<Vec<String>> {
        let set_key = self.secondary_key(secondary_key);
        let members: Vec<String> = self
            .client
            .smembers(&set_key)
            .await
            .map_err(from_redis_error)?;

        let mut values = Vec::with_capacity(members.len());
        for member in members {
            let value: Option<String> = self
                .client
                .get(self.token_key(&member))
                .await
                .map_err(from_redis_error)?;
            match value {
                Some(v) => values.push(v),
                None => {
                    self.client
                        .srem::<(), _, _>(&set_key, member)
                        .await
                        .map_err(from_redis_error)?;
                }
            }
        }
        Ok(values)
    }

    async fn take(&self, key: &str) -> CacheResult<Option<String>> {
        self.client
            .getdel(self.token_key(key))
            .await
            .map_err(from_redis_error)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.client
            .del::<(), _>(self.token_key(key))
            .await
            .map_err(from_redis_error)
    }

    async fn delete_expired(&self) -> CacheResult<u64> {
        // Tokens expire through their Redis TTL; only dangling set members
        // need cleaning up.
        let pattern = self.secondary_key("*");
        let mut pruned = 0;
        for set_key in self.scan_keys(&pattern).await? {
            pruned += self.prune_set(&set_key).await?;
        }
        if pruned > 0 {
            tracing::debug!(pruned, "pruned dangling secondary key members");
        }
        Ok(pruned)
    }
}
