//! Artifact and pending response cache.
//!
//! Short-lived protocol payloads keyed by an opaque handle. Entries live in
//! memory and are mirrored into the failover repository so any node can
//! resolve a handle issued by another one. Entries past their expiry, or
//! whose payload has left its own validity window, are absent even before
//! a sweep removes them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fed_cache::{TokenRepository, TokenRepositoryExt};
use fed_core::KeyedLocks;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::SamlMessage;

/// A payload with an optional validity window.
pub trait TimeBound {
    /// Returns the instant the payload stops being valid, if it has one.
    fn valid_until(&self) -> Option<DateTime<Utc>>;

    /// Returns true while the payload is still valid.
    fn is_time_valid(&self, now: DateTime<Utc>) -> bool {
        self.valid_until().map_or(true, |until| now < until)
    }
}

impl TimeBound for SamlMessage {
    fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.not_on_or_after()
    }
}

/// A cached payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExchange<T> {
    /// Opaque key.
    pub key: String,
    /// The payload.
    pub payload: T,
    /// Expiry; always in the future when stored.
    pub expires_at: DateTime<Utc>,
    /// Whether the repository accepted the mirror copy.
    #[serde(skip)]
    mirrored: bool,
}

impl<T: TimeBound> CachedExchange<T> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now && self.payload.is_time_valid(now)
    }
}

/// Single-use payload cache backed by memory and the failover repository.
pub struct ResponseCache<T> {
    namespace: &'static str,
    entries: DashMap<String, CachedExchange<T>>,
    locks: KeyedLocks,
    repository: Arc<dyn TokenRepository>,
    default_ttl: Duration,
}

impl<T> ResponseCache<T>
where
    T: TimeBound + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates an empty cache.
    ///
    /// `namespace` prefixes repository keys; `default_ttl` applies to
    /// payloads without a validity window.
    #[must_use]
    pub fn new(
        namespace: &'static str,
        repository: Arc<dyn TokenRepository>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            namespace,
            entries: DashMap::new(),
            locks: KeyedLocks::new(),
            repository,
            default_ttl,
        }
    }

    /// Stores a payload under a fresh artifact handle and returns it.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::ExpiredPayload`] if the payload is no longer
    /// valid.
    pub async fn store(&self, payload: T) -> SamlResult<String> {
        let key = fed_crypto::generate_artifact_handle();
        self.store_with_key(&key, payload).await?;
        Ok(key)
    }

    /// Stores a payload under a caller chosen key, replacing any entry.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::ExpiredPayload`] if the payload is no longer
    /// valid.
    pub async fn store_with_key(&self, key: &str, payload: T) -> SamlResult<()> {
        let now = Utc::now();
        let expires_at = payload
            .valid_until()
            .unwrap_or_else(|| now + self.default_ttl);
        if expires_at <= now {
            return Err(SamlError::ExpiredPayload);
        }

        let _guard = self.locks.lock(key).await;
        let mut exchange = CachedExchange {
            key: key.to_string(),
            payload,
            expires_at,
            mirrored: false,
        };
        match self
            .repository
            .save_json(&self.repository_key(key), None, &exchange, expires_at)
            .await
        {
            Ok(()) => exchange.mirrored = true,
            Err(e) => {
                tracing::warn!(
                    namespace = self.namespace,
                    error = %e,
                    "failed to mirror cached payload"
                );
            }
        }
        self.entries.insert(key.to_string(), exchange);
        tracing::debug!(namespace = self.namespace, %expires_at, "payload cached");
        Ok(())
    }

    /// Consumes the payload stored under `key`.
    ///
    /// A second `take` of the same key returns `None`, on this node or on
    /// any other node sharing the repository.
    pub async fn take(&self, key: &str) -> Option<T> {
        let _guard = self.locks.lock(key).await;
        let now = Utc::now();
        let local = self.entries.remove(key).map(|(_, e)| e);
        let mirrored = self
            .repository
            .take_json::<CachedExchange<T>>(&self.repository_key(key))
            .await
            .inspect_err(|e| {
                tracing::warn!(namespace = self.namespace, error = %e, "repository take failed");
            });

        let exchange = match (local, mirrored) {
            // Mirrored here but gone from the repository: another node
            // consumed it.
            (Some(local), Ok(None)) if local.mirrored => None,
            (Some(local), _) => Some(local),
            (None, Ok(remote)) => remote,
            (None, Err(_)) => None,
        }?;

        if !exchange.is_live(now) {
            tracing::debug!(namespace = self.namespace, "cached payload expired");
            return None;
        }
        Some(exchange.payload)
    }

    /// Returns the payload under `key` without consuming it.
    pub async fn peek(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        let local = self.entries.get(key).map(|e| e.value().clone());
        let exchange = match local {
            Some(exchange) => exchange,
            None => match self
                .repository
                .retrieve_json::<CachedExchange<T>>(&self.repository_key(key))
                .await
            {
                Ok(found) => found?,
                Err(e) => {
                    tracing::warn!(namespace = self.namespace, error = %e, "repository read failed");
                    return None;
                }
            },
        };
        exchange.is_live(now).then_some(exchange.payload)
    }

    /// Removes every entry that is no longer live and returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(namespace = self.namespace, removed, "swept cached payloads");
        }
        removed
    }

    /// Returns the number of entries held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is held in memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn repository_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("namespace", &self.namespace)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}
