//! Transient NameID reverse lookup.
//!
//! Transient identifiers live only as long as the session they were
//! issued in, so they are kept here instead of in the account store.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct TransientEntry {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Transient NameID value to user map.
#[derive(Debug, Default)]
pub struct TransientNameIdCache {
    entries: DashMap<String, TransientEntry>,
}

impl TransientNameIdCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the user a transient NameID was issued for.
    pub fn insert(&self, name_id_value: &str, user_id: &str, ttl: Duration) {
        self.entries.insert(
            name_id_value.to_string(),
            TransientEntry {
                user_id: user_id.to_string(),
                expires_at: Utc::now() + ttl,
            },
        );
    }

    /// Returns the user a live transient NameID was issued for.
    #[must_use]
    pub fn user_for(&self, name_id_value: &str) -> Option<String> {
        let now = Utc::now();
        let live = self
            .entries
            .get(name_id_value)
            .map(|e| (e.expires_at > now).then(|| e.user_id.clone()))?;
        if live.is_none() {
            self.entries.remove(name_id_value);
        }
        live
    }

    /// Forgets a transient NameID.
    pub fn remove(&self, name_id_value: &str) -> bool {
        self.entries.remove(name_id_value).is_some()
    }

    /// Removes expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
