//! Lock striping by logical key.
//!
//! [`KeyedLocks`] hands out one async mutex per key (a session index or a
//! federation key). Entries are reference counted and removed from the
//! map as soon as the last holder or waiter lets go, so the map only ever
//! contains keys that are currently in use.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Keyed lock factory.
///
/// Cloning is cheap and clones share the same lock map.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<LockMap>,
}

impl KeyedLocks {
    /// Creates an empty lock factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key`, waiting for the current holder.
    ///
    /// The lock is released when the returned guard is dropped, including
    /// when the holder returns early with an error.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        // Cleans the entry up if this future is dropped while waiting.
        let waiter = Waiter {
            key,
            locks: &self.locks,
            mutex: Some(Arc::clone(&mutex)),
        };
        let guard = mutex.lock_owned().await;
        waiter.disarm();

        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Acquires several keys at once.
    ///
    /// Keys are de-duplicated and taken in sorted order so two callers
    /// locking overlapping key sets cannot deadlock each other.
    pub async fn lock_many<I, S>(&self, keys: I) -> Vec<KeyGuard>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Returns the number of keys currently locked or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no key is locked or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

impl fmt::Debug for KeyedLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLocks")
            .field("active", &self.len())
            .finish()
    }
}

/// Guard for one locked key.
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl KeyGuard {
    /// Returns the locked key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.locks, &self.key);
    }
}

struct Waiter<'a> {
    key: &'a str,
    locks: &'a LockMap,
    mutex: Option<Arc<AsyncMutex<()>>>,
}

impl Waiter<'_> {
    fn disarm(mut self) {
        // The acquired guard keeps its own reference.
        self.mutex.take();
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(mutex) = self.mutex.take() {
            drop(mutex);
            prune(self.locks, self.key);
        }
    }
}

/// Removes the entry for `key` if only the map still references it.
fn prune(locks: &LockMap, key: &str) {
    let mut map = locks.lock();
    if map.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
        map.remove(key);
    }
}
