//! Redis repository configuration.
//!
//! The repository is addressed by a single URL (`redis://` or `rediss://`),
//! the form `REDIS_URL` carries. Every key the repository writes lives under
//! the configured prefix so several engines can share one Redis database.

use serde::{Deserialize, Serialize};

use fed_cache::{CacheError, CacheResult};

const DEFAULT_URL: &str = "redis://127.0.0.1:6379/0";

/// Where and how the repository talks to Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Namespace of every key; empty for none.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Per-command timeout in milliseconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: default_key_prefix(),
            connect_timeout_ms: default_connect_timeout(),
            command_timeout_ms: default_command_timeout(),
        }
    }
}

impl RedisConfig {
    /// Creates a configuration pointing at a local Redis.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the connection and command timeouts in milliseconds.
    #[must_use]
    pub const fn timeouts(mut self, connect_ms: u64, command_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.command_timeout_ms = command_ms;
        self
    }

    /// Checks the URL scheme and the timeouts.
    ///
    /// ## Errors
    ///
    /// Returns [`CacheError::Configuration`] describing the first problem.
    pub fn validate(&self) -> CacheResult<()> {
        if !(self.url.starts_with("redis://") || self.url.starts_with("rediss://")) {
            return Err(CacheError::Configuration(format!(
                "unsupported redis url scheme: {}",
                self.url.split("://").next().unwrap_or_default()
            )));
        }
        if self.connect_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err(CacheError::Configuration(
                "redis timeouts must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Key holding the payload stored under `key`.
    #[must_use]
    pub fn token_key(&self, key: &str) -> String {
        self.namespaced("token", key)
    }

    /// Key of the set indexing payloads by secondary key.
    #[must_use]
    pub fn secondary_key(&self, secondary: &str) -> String {
        self.namespaced("secondary", secondary)
    }

    fn namespaced(&self, kind: &str, key: &str) -> String {
        if self.key_prefix.is_empty() {
            format!("{kind}:{key}")
        } else {
            format!("{}:{kind}:{key}", self.key_prefix)
        }
    }
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_key_prefix() -> String {
    "fed".to_string()
}

const fn default_connect_timeout() -> u64 {
    5000
}

const fn default_command_timeout() -> u64 {
    2000
}
