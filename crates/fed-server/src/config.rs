//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::str::FromStr;

use fed_core::Config;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Engine configuration.
    pub engine: Config,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut engine = Config::default();

        engine.logout.dispatch_timeout_ms = parse_or(
            &lookup,
            "FED_DISPATCH_TIMEOUT_MS",
            engine.logout.dispatch_timeout_ms,
        )?;
        engine.logout.concurrent_dispatch = lookup("FED_CONCURRENT_DISPATCH")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(engine.logout.concurrent_dispatch);
        engine.logout.request_validity_secs = parse_or(
            &lookup,
            "FED_LOGOUT_VALIDITY_SECS",
            engine.logout.request_validity_secs,
        )?;

        engine.artifact.sweep_interval_secs = parse_or(
            &lookup,
            "FED_SWEEP_INTERVAL_SECS",
            engine.artifact.sweep_interval_secs,
        )?;
        engine.artifact.default_ttl_secs =
            parse_or(&lookup, "FED_ARTIFACT_TTL_SECS", engine.artifact.default_ttl_secs)?;

        engine.session.fallback_ttl_secs = parse_or(
            &lookup,
            "FED_SESSION_FALLBACK_TTL_SECS",
            engine.session.fallback_ttl_secs,
        )?;

        engine.repository.redis_url = lookup("REDIS_URL").filter(|v| !v.is_empty());
        engine.repository.key_prefix = lookup("FED_REDIS_KEY_PREFIX").filter(|v| !v.is_empty());

        engine.validate()?;

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self { engine, log_level })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine: Config::default(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw}: {e}")),
        None => Ok(default),
    }
}
