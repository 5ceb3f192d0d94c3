//! Session index cache.
//!
//! Owns every [`IdpSession`] of this node. Mutations on one session index
//! run under that index's key lock; the in-memory map is authoritative and
//! every mutation is mirrored into the failover repository so another node
//! can rehydrate the session after a failover. Repository failures are
//! logged and never fail the in-memory operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fed_cache::{TokenRepository, TokenRepositoryExt};
use fed_core::event::{Event, EventType};
use fed_core::{KeyGuard, KeyedLocks};
use fed_model::NameId;
use fed_spi::LocalSessionProvider;
use parking_lot::RwLock;

use crate::error::{SessionError, SessionResult};
use crate::idp_session::{IdpSession, NameIdPair};

const SNAPSHOT_PREFIX: &str = "idp-session:";

/// Result of removing an SP from a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairRemoval {
    /// Pairs that were removed.
    pub removed: Vec<NameIdPair>,
    /// Whether the session was destroyed because no pair was left.
    pub session_removed: bool,
}

/// In-memory map of session index to [`IdpSession`], read-through and
/// write-through against a [`TokenRepository`].
pub struct SessionIndexCache {
    sessions: RwLock<HashMap<String, IdpSession>>,
    locks: KeyedLocks,
    repository: Arc<dyn TokenRepository>,
    local_sessions: Arc<dyn LocalSessionProvider>,
    fallback_ttl: Duration,
}

impl SessionIndexCache {
    /// Creates an empty cache.
    ///
    /// `fallback_ttl` is the snapshot lifetime used when the local session
    /// cannot report its remaining time.
    #[must_use]
    pub fn new(
        repository: Arc<dyn TokenRepository>,
        local_sessions: Arc<dyn LocalSessionProvider>,
        fallback_ttl: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
            repository,
            local_sessions,
            fallback_ttl,
        }
    }

    /// Acquires the lock of a session index.
    ///
    /// Everything done through the returned handle is serialized with
    /// every other holder of the same index. The lock is released when the
    /// handle is dropped.
    pub async fn lock(&self, session_index: &str) -> LockedSession<'_> {
        let guard = self.locks.lock(session_index).await;
        tracing::trace!(session_index = %session_index, "session lock acquired");
        LockedSession {
            cache: self,
            session_index: session_index.to_string(),
            _guard: guard,
        }
    }

    /// Acquires the locks of several session indexes.
    ///
    /// Indexes are de-duplicated and locked in sorted order.
    pub async fn lock_many(&self, session_indexes: &[String]) -> Vec<LockedSession<'_>> {
        self.locks
            .lock_many(session_indexes)
            .await
            .into_iter()
            .map(|guard| LockedSession {
                cache: self,
                session_index: guard.key().to_string(),
                _guard: guard,
            })
            .collect()
    }

    /// Returns the session, rehydrating it from the repository on a miss.
    pub async fn get(&self, session_index: &str) -> Option<IdpSession> {
        let hit = self.sessions.read().get(session_index).cloned();
        match hit {
            Some(session) => Some(session),
            None => self.lock(session_index).await.get().await,
        }
    }

    /// Returns the session, creating it if neither memory nor the
    /// repository knows it.
    pub async fn get_or_create(
        &self,
        session_index: &str,
        local_session_handle: &str,
        meta_alias: &str,
    ) -> IdpSession {
        self.lock(session_index)
            .await
            .get_or_create(local_session_handle, meta_alias)
            .await
            .0
    }

    /// Adds a `(NameID, SP)` pair; a no-op if the SP is already present.
    ///
    /// ## Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn add_pair(
        &self,
        session_index: &str,
        name_id: NameId,
        sp_entity_id: &str,
    ) -> SessionResult<bool> {
        self.lock(session_index)
            .await
            .add_pair(NameIdPair::new(name_id, sp_entity_id))
            .await
    }

    /// Removes every pair of an SP, destroying the session if it was the
    /// last one.
    ///
    /// ## Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn remove_pair(
        &self,
        session_index: &str,
        sp_entity_id: &str,
    ) -> SessionResult<PairRemoval> {
        self.lock(session_index)
            .await
            .remove_pair(sp_entity_id)
            .await
    }

    /// Removes the session.
    pub async fn remove(&self, session_index: &str) -> Option<IdpSession> {
        self.lock(session_index).await.remove().await
    }

    /// Returns the indexes of in-memory sessions holding a pair.
    ///
    /// Only this node's sessions are searched.
    #[must_use]
    pub fn find_by_pair(&self, name_id_value: &str, sp_entity_id: &str) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|s| {
                s.pairs()
                    .iter()
                    .any(|p| p.sp_entity_id == sp_entity_id && p.name_id.value == name_id_value)
            })
            .map(|s| s.session_index.clone())
            .collect()
    }

    /// Returns the indexes of sessions bound to a local session handle,
    /// from memory and from the repository.
    pub async fn find_by_handle(&self, local_session_handle: &str) -> Vec<String> {
        let mut indexes: Vec<String> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.local_session_handle == local_session_handle)
            .map(|s| s.session_index.clone())
            .collect();

        match self
            .repository
            .retrieve_by_secondary_key(local_session_handle)
            .await
        {
            Ok(snapshots) => {
                for data in snapshots {
                    match serde_json::from_str::<IdpSession>(&data) {
                        Ok(session) => indexes.push(session.session_index),
                        Err(e) => tracing::warn!(error = %e, "skipping unreadable session snapshot"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "session lookup by handle failed in repository"),
        }

        indexes.sort();
        indexes.dedup();
        indexes
    }

    /// Returns the number of sessions held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no session is held in memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Returns the number of session indexes currently locked.
    #[must_use]
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    async fn load(&self, session_index: &str) -> Option<IdpSession> {
        let key = snapshot_key(session_index);
        match self.repository.retrieve_json::<IdpSession>(&key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    session_index = %session_index,
                    error = %e,
                    "failed to read session snapshot"
                );
                None
            }
        }
    }

    async fn write_through(&self, session: &IdpSession) {
        let ttl = self.snapshot_ttl(&session.local_session_handle).await;
        let key = snapshot_key(&session.session_index);
        if let Err(e) = self
            .repository
            .save_json(
                &key,
                Some(&session.local_session_handle),
                session,
                expiry_after(ttl),
            )
            .await
        {
            tracing::warn!(
                session_index = %session.session_index,
                error = %e,
                "failed to mirror session snapshot"
            );
        }
    }

    async fn delete_snapshot(&self, session_index: &str) {
        if let Err(e) = self.repository.delete(&snapshot_key(session_index)).await {
            tracing::warn!(
                session_index = %session_index,
                error = %e,
                "failed to delete session snapshot"
            );
        }
    }

    async fn snapshot_ttl(&self, local_session_handle: &str) -> Duration {
        match self.local_sessions.time_left(local_session_handle).await {
            Ok(Some(left)) if !left.is_zero() => left,
            Ok(_) => self.fallback_ttl,
            Err(e) => {
                tracing::debug!(error = %e, "time left unavailable, using fallback ttl");
                self.fallback_ttl
            }
        }
    }
}

impl std::fmt::Debug for SessionIndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIndexCache")
            .field("sessions", &self.len())
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one session index.
pub struct LockedSession<'a> {
    cache: &'a SessionIndexCache,
    session_index: String,
    _guard: KeyGuard,
}

impl LockedSession<'_> {
    /// Returns the locked session index.
    #[must_use]
    pub fn session_index(&self) -> &str {
        &self.session_index
    }

    /// Returns the session, rehydrating it from the repository on a miss.
    pub async fn get(&self) -> Option<IdpSession> {
        let hit = self.cache.sessions.read().get(&self.session_index).cloned();
        if hit.is_some() {
            tracing::debug!(session_index = %self.session_index, "session cache hit");
            return hit;
        }

        let loaded = self.cache.load(&self.session_index).await?;
        tracing::debug!(session_index = %self.session_index, "session rehydrated from repository");
        self.cache
            .sessions
            .write()
            .insert(self.session_index.clone(), loaded.clone());
        Some(loaded)
    }

    /// Returns the session, creating it when unknown. The flag tells
    /// whether it was created.
    pub async fn get_or_create(
        &self,
        local_session_handle: &str,
        meta_alias: &str,
    ) -> (IdpSession, bool) {
        if let Some(existing) = self.get().await {
            return (existing, false);
        }

        let session = IdpSession::new(&self.session_index, local_session_handle, meta_alias);
        self.store(session.clone()).await;

        tracing::info!(
            session_index = %self.session_index,
            meta_alias = %meta_alias,
            "IdP session created"
        );
        Event::builder(EventType::IdpSessionCreated)
            .session(&self.session_index)
            .detail("meta_alias", meta_alias)
            .emit();
        (session, true)
    }

    /// Adds a pair; a no-op returning false if the SP is already present.
    ///
    /// ## Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn add_pair(&self, pair: NameIdPair) -> SessionResult<bool> {
        let mut session = self.require().await?;
        let sp = pair.sp_entity_id.clone();
        if !session.add_pair(pair) {
            tracing::debug!(session_index = %self.session_index, sp = %sp, "pair already present");
            return Ok(false);
        }
        self.store(session).await;
        tracing::debug!(session_index = %self.session_index, sp = %sp, "pair added");
        Ok(true)
    }

    /// Appends the pair produced by a NameID re-key.
    ///
    /// ## Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn append_rekeyed_pair(&self, pair: NameIdPair) -> SessionResult<bool> {
        let mut session = self.require().await?;
        if !session.append_rekeyed_pair(pair) {
            return Ok(false);
        }
        self.store(session).await;
        Ok(true)
    }

    /// Removes every pair of an SP, destroying the session if it was the
    /// last one.
    ///
    /// ## Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn remove_pair(&self, sp_entity_id: &str) -> SessionResult<PairRemoval> {
        let mut session = self.require().await?;
        let removed = session.remove_pairs_for(sp_entity_id);
        if removed.is_empty() {
            return Ok(PairRemoval::default());
        }

        if session.is_empty() {
            self.remove().await;
            return Ok(PairRemoval {
                removed,
                session_removed: true,
            });
        }

        self.store(session).await;
        Ok(PairRemoval {
            removed,
            session_removed: false,
        })
    }

    /// Removes the session from memory and from the repository.
    pub async fn remove(&self) -> Option<IdpSession> {
        let in_memory = self.cache.sessions.write().remove(&self.session_index);
        let removed = match in_memory {
            Some(session) => Some(session),
            None => self.cache.load(&self.session_index).await,
        };
        self.cache.delete_snapshot(&self.session_index).await;

        if let Some(session) = &removed {
            tracing::info!(
                session_index = %self.session_index,
                pairs = session.pairs().len(),
                "IdP session removed"
            );
            Event::builder(EventType::IdpSessionRemoved)
                .session(&self.session_index)
                .detail("meta_alias", session.meta_alias.as_str())
                .emit();
        }
        removed
    }

    async fn require(&self) -> SessionResult<IdpSession> {
        self.get()
            .await
            .ok_or_else(|| SessionError::NotFound(self.session_index.clone()))
    }

    async fn store(&self, session: IdpSession) {
        self.cache
            .sessions
            .write()
            .insert(self.session_index.clone(), session.clone());
        self.cache.write_through(&session).await;
    }
}

fn snapshot_key(session_index: &str) -> String {
    format!("{SNAPSHOT_PREFIX}{session_index}")
}

/// Absolute expiry `ttl` from now, capped at one year.
fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);
    let ttl = chrono::Duration::from_std(ttl.min(MAX_TTL)).unwrap_or_default();
    Utc::now() + ttl
}
