//! Account federation store.

use std::collections::HashMap;

use async_trait::async_trait;
use fed_model::{FederationKey, NameIdInfo};
use tokio::sync::RwLock;

use crate::error::AccountResult;

/// External store persisting federation records per user.
///
/// Implementations persist long-term identity data (a directory, a
/// database); the engine only issues single-record operations.
#[async_trait]
pub trait AccountFederationStore: Send + Sync {
    /// Loads the record of `(user_id, local, remote)`.
    async fn load(
        &self,
        user_id: &str,
        local_entity_id: &str,
        remote_entity_id: &str,
    ) -> AccountResult<Option<NameIdInfo>>;

    /// Stores a record, replacing the one with the same triple.
    async fn save(&self, user_id: &str, record: &NameIdInfo) -> AccountResult<()>;

    /// Deletes the record of `(user_id, local, remote)`; returns whether
    /// one existed.
    async fn delete(
        &self,
        user_id: &str,
        local_entity_id: &str,
        remote_entity_id: &str,
    ) -> AccountResult<bool>;

    /// Returns the user owning the federation with this key.
    async fn find_user(&self, key: &FederationKey) -> AccountResult<Option<String>>;
}

type RecordId = (String, String, String);

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<RecordId, NameIdInfo>,
    by_key: HashMap<FederationKey, RecordId>,
}

/// In-memory [`AccountFederationStore`].
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    records: RwLock<Records>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }

    /// Returns true if no record is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.by_id.is_empty()
    }
}

fn record_id(user_id: &str, local: &str, remote: &str) -> RecordId {
    (user_id.to_string(), local.to_string(), remote.to_string())
}

#[async_trait]
impl AccountFederationStore for InMemoryAccountStore {
    async fn load(
        &self,
        user_id: &str,
        local_entity_id: &str,
        remote_entity_id: &str,
    ) -> AccountResult<Option<NameIdInfo>> {
        let id = record_id(user_id, local_entity_id, remote_entity_id);
        Ok(self.records.read().await.by_id.get(&id).cloned())
    }

    async fn save(&self, user_id: &str, record: &NameIdInfo) -> AccountResult<()> {
        let id = record_id(user_id, &record.local_entity_id, &record.remote_entity_id);
        let mut records = self.records.write().await;
        if let Some(previous) = records.by_id.insert(id.clone(), record.clone()) {
            records.by_key.remove(&previous.federation_key());
        }
        records.by_key.insert(record.federation_key(), id);
        Ok(())
    }

    async fn delete(
        &self,
        user_id: &str,
        local_entity_id: &str,
        remote_entity_id: &str,
    ) -> AccountResult<bool> {
        let id = record_id(user_id, local_entity_id, remote_entity_id);
        let mut records = self.records.write().await;
        match records.by_id.remove(&id) {
            Some(previous) => {
                records.by_key.remove(&previous.federation_key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_user(&self, key: &FederationKey) -> AccountResult<Option<String>> {
        Ok(self
            .records
            .read()
            .await
            .by_key
            .get(key)
            .map(|(user, _, _)| user.clone()))
    }
}
