//! In-memory token repository.
//!
//! Suitable for single-node deployments and tests. Nothing survives a
//! restart and nothing is shared between processes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{CacheError, CacheResult};
use crate::repository::TokenRepository;

#[derive(Debug, Clone)]
struct StoredToken {
    data: String,
    secondary_key: Option<String>,
    expires_at: DateTime<Utc>,
}

impl StoredToken {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// In-memory [`TokenRepository`].
#[derive(Debug, Default)]
pub struct InMemoryTokenRepository {
    tokens: RwLock<HashMap<String, StoredToken>>,
}

impl InMemoryTokenRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn save(
        &self,
        key: &str,
        secondary_key: Option<&str>,
        data: &str,
        expires_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        if expires_at <= Utc::now() {
            return Err(CacheError::InvalidExpiry);
        }
        let token = StoredToken {
            data: data.to_string(),
            secondary_key: secondary_key.map(str::to_string),
            expires_at,
        };
        self.tokens.write().await.insert(key.to_string(), token);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Utc::now();
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(key)
            .filter(|t| t.is_live(now))
            .map(|t| t.data.clone()))
    }

    async fn retrieve_by_secondary_key(&self, secondary_key: &str) -> CacheResult<Vec<String>> {
        let now = Utc::now();
        let tokens = self.tokens.read().await;
        Ok(tokens
            .values()
            .filter(|t| t.is_live(now) && t.secondary_key.as_deref() == Some(secondary_key))
            .map(|t| t.data.clone())
            .collect())
    }

    async fn take(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Utc::now();
        let removed = self.tokens.write().await.remove(key);
        Ok(removed.filter(|t| t.is_live(now)).map(|t| t.data))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.tokens.write().await.remove(key);
        Ok(())
    }

    async fn delete_expired(&self) -> CacheResult<u64> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.is_live(now));
        let removed = (before - tokens.len()) as u64;
        if removed > 0 {
            tracing::debug!(removed, "purged expired repository entries");
        }
        Ok(removed)
    }
}
