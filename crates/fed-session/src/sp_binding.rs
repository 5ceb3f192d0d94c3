//! SP session bindings.
//!
//! On a hosted SP several local sessions can share one federated identity
//! (one per browser, for example). The bindings map each federation key to
//! that set of sessions. A key's set is only touched while its key lock is
//! held, and a set is dropped as soon as it becomes empty.

use std::collections::{BTreeMap, HashMap};

use fed_core::{KeyGuard, KeyedLocks};
use fed_model::FederationKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// A local SP session bound to a federated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpSession {
    /// Handle of the local session.
    pub handle: String,
    /// Session index the IdP issued for this session, if any.
    pub idp_session_index: Option<String>,
    /// Meta alias of the hosted SP.
    pub meta_alias: String,
}

impl SpSession {
    /// Creates a new binding entry.
    #[must_use]
    pub fn new(
        handle: impl Into<String>,
        idp_session_index: Option<String>,
        meta_alias: impl Into<String>,
    ) -> Self {
        Self {
            handle: handle.into(),
            idp_session_index,
            meta_alias: meta_alias.into(),
        }
    }
}

type BindingSet = BTreeMap<String, SpSession>;

/// Federation key to local sessions map.
#[derive(Debug, Default)]
pub struct SpSessionBindings {
    bindings: RwLock<HashMap<FederationKey, BindingSet>>,
    locks: KeyedLocks,
}

impl SpSessionBindings {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks one or more federation keys.
    ///
    /// Keys are taken in a fixed order so callers locking overlapping sets
    /// cannot deadlock.
    pub async fn lock(&self, keys: &[&FederationKey]) -> BindingGuard<'_> {
        let guards = self.locks.lock_many(keys.iter().map(|k| k.as_str())).await;
        BindingGuard {
            bindings: self,
            keys: keys.iter().map(|k| (*k).clone()).collect(),
            _guards: guards,
        }
    }

    /// Binds a local session to a federation key.
    pub async fn add(&self, key: &FederationKey, session: SpSession) -> SessionResult<bool> {
        self.lock(&[key]).await.add(key, session)
    }

    /// Unbinds one local session.
    pub async fn remove(&self, key: &FederationKey, handle: &str) -> SessionResult<bool> {
        self.lock(&[key]).await.remove(key, handle)
    }

    /// Returns the sessions bound to a key.
    #[must_use]
    pub fn get(&self, key: &FederationKey) -> Vec<SpSession> {
        self.bindings
            .read()
            .get(key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the keys a local session is bound under.
    #[must_use]
    pub fn keys_for_handle(&self, handle: &str) -> Vec<FederationKey> {
        self.bindings
            .read()
            .iter()
            .filter(|(_, set)| set.contains_key(handle))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns the number of bound federation keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

/// Exclusive access to a set of federation keys.
pub struct BindingGuard<'a> {
    bindings: &'a SpSessionBindings,
    keys: Vec<FederationKey>,
    _guards: Vec<KeyGuard>,
}

impl BindingGuard<'_> {
    fn check(&self, key: &FederationKey) -> SessionResult<()> {
        if self.keys.contains(key) {
            Ok(())
        } else {
            Err(SessionError::KeyNotLocked(key.to_string()))
        }
    }

    /// Returns the sessions bound to a locked key.
    pub fn get(&self, key: &FederationKey) -> SessionResult<Vec<SpSession>> {
        self.check(key)?;
        Ok(self.bindings.get(key))
    }

    /// Binds a session; returns false if the handle was already bound.
    pub fn add(&self, key: &FederationKey, session: SpSession) -> SessionResult<bool> {
        self.check(key)?;
        let mut bindings = self.bindings.bindings.write();
        let set = bindings.entry(key.clone()).or_default();
        let added = !set.contains_key(&session.handle);
        set.insert(session.handle.clone(), session);
        Ok(added)
    }

    /// Unbinds one session, dropping the key once its set is empty.
    pub fn remove(&self, key: &FederationKey, handle: &str) -> SessionResult<bool> {
        self.check(key)?;
        let mut bindings = self.bindings.bindings.write();
        let Some(set) = bindings.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(handle).is_some();
        if set.is_empty() {
            bindings.remove(key);
        }
        Ok(removed)
    }

    /// Removes and returns every session bound to a key.
    pub fn take(&self, key: &FederationKey) -> SessionResult<Vec<SpSession>> {
        self.check(key)?;
        Ok(self
            .bindings
            .bindings
            .write()
            .remove(key)
            .map(|set| set.into_values().collect())
            .unwrap_or_default())
    }

    /// Removes and returns the sessions whose IdP session index is listed.
    /// An empty list matches every session.
    pub fn take_matching(
        &self,
        key: &FederationKey,
        session_indexes: &[String],
    ) -> SessionResult<Vec<SpSession>> {
        if session_indexes.is_empty() {
            return self.take(key);
        }
        self.check(key)?;

        let mut bindings = self.bindings.bindings.write();
        let Some(set) = bindings.get_mut(key) else {
            return Ok(Vec::new());
        };
        let handles: Vec<String> = set
            .values()
            .filter(|s| {
                s.idp_session_index
                    .as_ref()
                    .is_some_and(|idx| session_indexes.contains(idx))
            })
            .map(|s| s.handle.clone())
            .collect();
        let taken = handles.iter().filter_map(|h| set.remove(h)).collect();
        if set.is_empty() {
            bindings.remove(key);
        }
        Ok(taken)
    }

    /// Moves the sessions bound under `old` to `new`, unchanged.
    ///
    /// Sessions already bound under `new` are kept. Returns the number of
    /// sessions moved.
    pub fn rekey(&self, old: &FederationKey, new: &FederationKey) -> SessionResult<usize> {
        self.check(old)?;
        self.check(new)?;
        if old == new {
            return Ok(0);
        }

        let mut bindings = self.bindings.bindings.write();
        let Some(moved) = bindings.remove(old) else {
            return Ok(0);
        };
        let count = moved.len();
        bindings.entry(new.clone()).or_default().extend(moved);
        Ok(count)
    }
}
