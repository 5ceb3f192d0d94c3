//! Failover token repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CacheResult;

/// Shared store replicating ephemeral state across cluster nodes.
///
/// Implementations provide atomicity for single-key operations only; the
/// engine never issues multi-key transactions. Entries past their expiry
/// are logically absent even if the backend has not purged them yet.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Stores `data` under `key`, replacing any previous value.
    ///
    /// `secondary_key` adds the entry to a group that can be listed with
    /// [`retrieve_by_secondary_key`](Self::retrieve_by_secondary_key).
    ///
    /// ## Errors
    ///
    /// Returns `CacheError::InvalidExpiry` if `expires_at` is not in the
    /// future.
    async fn save(
        &self,
        key: &str,
        secondary_key: Option<&str>,
        data: &str,
        expires_at: DateTime<Utc>,
    ) -> CacheResult<()>;

    /// Returns the value stored under `key`.
    async fn retrieve(&self, key: &str) -> CacheResult<Option<String>>;

    /// Returns every live value stored under `secondary_key`.
    async fn retrieve_by_secondary_key(&self, secondary_key: &str) -> CacheResult<Vec<String>>;

    /// Returns and removes the value stored under `key` in one step.
    async fn take(&self, key: &str) -> CacheResult<Option<String>>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Purges expired entries and returns how many were removed.
    async fn delete_expired(&self) -> CacheResult<u64>;
}

/// JSON helpers over any [`TokenRepository`].
#[async_trait]
pub trait TokenRepositoryExt: TokenRepository {
    /// Serializes `value` and stores it.
    async fn save_json<T>(
        &self,
        key: &str,
        secondary_key: Option<&str>,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let data = serde_json::to_string(value)?;
        self.save(key, secondary_key, &data, expires_at).await
    }

    /// Retrieves and deserializes the value under `key`.
    async fn retrieve_json<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.retrieve(key).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Takes and deserializes the value under `key`.
    async fn take_json<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.take(key).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}

impl<R: TokenRepository + ?Sized> TokenRepositoryExt for R {}
