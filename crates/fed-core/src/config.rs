//! Engine configuration.
//!
//! Every section has defaults so a deployment only overrides what it needs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure for the federation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session index cache configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logout fan-out configuration.
    #[serde(default)]
    pub logout: LogoutConfig,
    /// Artifact / pending response cache configuration.
    #[serde(default)]
    pub artifact: ArtifactConfig,
    /// Failover repository configuration.
    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// Session index cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Snapshot lifetime in seconds used when the local session
    /// reports no remaining time.
    #[serde(default = "default_fallback_ttl")]
    pub fallback_ttl_secs: u64,
}

/// Logout fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutConfig {
    /// Per-target dispatch timeout in milliseconds.
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_ms: u64,
    /// Dispatch to all targets concurrently instead of one by one.
    #[serde(default = "default_true")]
    pub concurrent_dispatch: bool,
    /// Validity window of outbound logout requests in seconds.
    #[serde(default = "default_request_validity")]
    pub request_validity_secs: i64,
}

/// Artifact and pending response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Lifetime in seconds for payloads that carry no validity window.
    #[serde(default = "default_artifact_ttl")]
    pub default_ttl_secs: i64,
    /// Interval between two background sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// Failover repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Redis URL; the in-memory repository is used when absent.
    pub redis_url: Option<String>,
    /// Key prefix applied to every repository key.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fallback_ttl_secs: default_fallback_ttl(),
        }
    }
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: default_dispatch_timeout(),
            concurrent_dispatch: true,
            request_validity_secs: default_request_validity(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_artifact_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Config {
    /// Validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Config`] when a timeout or interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.logout.dispatch_timeout_ms == 0 {
            return Err(Error::Config("logout.dispatch_timeout_ms must be > 0".into()));
        }
        if self.logout.request_validity_secs <= 0 {
            return Err(Error::Config(
                "logout.request_validity_secs must be > 0".into(),
            ));
        }
        if self.artifact.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "artifact.sweep_interval_secs must be > 0".into(),
            ));
        }
        if self.artifact.default_ttl_secs <= 0 {
            return Err(Error::Config("artifact.default_ttl_secs must be > 0".into()));
        }
        if self.session.fallback_ttl_secs == 0 {
            return Err(Error::Config("session.fallback_ttl_secs must be > 0".into()));
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Returns the fallback snapshot lifetime.
    #[must_use]
    pub const fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }
}

impl LogoutConfig {
    /// Returns the per-target dispatch timeout.
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Returns the validity window of outbound logout requests.
    #[must_use]
    pub fn request_validity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.request_validity_secs)
    }
}

impl ArtifactConfig {
    /// Returns the sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Returns the default payload lifetime.
    #[must_use]
    pub fn default_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_ttl_secs)
    }
}

const fn default_fallback_ttl() -> u64 {
    7200
}

const fn default_dispatch_timeout() -> u64 {
    10_000
}

const fn default_request_validity() -> i64 {
    600
}

const fn default_artifact_ttl() -> i64 {
    600
}

const fn default_sweep_interval() -> u64 {
    60
}

const fn default_true() -> bool {
    true
}
