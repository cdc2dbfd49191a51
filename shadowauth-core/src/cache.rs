//! Fallback session cache, the store of last resort.
//!
//! [`MemorySessionCache`] lives for the lifetime of the process and is cleared on restart. It
//! gives no durability and no consistency across instances; it only keeps the service usable
//! while the runtime and the contract are unavailable or still being provisioned. Deployments
//! with several instances should plug an external key-value store in behind [`SessionCache`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    utils::{now_millis, redact},
    SessionKey, SessionRecord,
};

/// Storage for fallback session records.
///
/// Expiry is lazy: `get` removes and hides a record whose expiry has passed.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Inserts or overwrites a record.
    async fn put(&self, record: SessionRecord);

    /// Looks a record up. Expired records are deleted and reported absent.
    async fn get(&self, session_key: &SessionKey) -> Option<SessionRecord>;

    /// Removes a record. Returns whether it existed.
    async fn delete(&self, session_key: &SessionKey) -> bool;

    /// Clears `is_valid` on a record. Returns whether it existed.
    async fn invalidate(&self, session_key: &SessionKey) -> bool;

    /// Removes every record expired at `now` (unix milliseconds). Returns the count removed.
    async fn purge_expired(&self, now: u64) -> usize;
}

/// In-process [`SessionCache`] guarded by a single mutex. Every operation is one map access.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    sessions: Mutex<HashMap<SessionKey, SessionRecord>>,
}

impl MemorySessionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written record behind, so the map is
    // still usable after poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn put(&self, record: SessionRecord) {
        self.lock().insert(record.session_key, record);
    }

    async fn get(&self, session_key: &SessionKey) -> Option<SessionRecord> {
        let now = now_millis();
        let mut sessions = self.lock();
        let expired = sessions.get(session_key)?.is_expired(now);
        if expired {
            debug!(
                session_key = %redact(&session_key.to_hex()),
                "fallback cache: dropping expired session"
            );
            sessions.remove(session_key);
            return None;
        }
        sessions.get(session_key).cloned()
    }

    async fn delete(&self, session_key: &SessionKey) -> bool {
        self.lock().remove(session_key).is_some()
    }

    async fn invalidate(&self, session_key: &SessionKey) -> bool {
        self.lock().get_mut(session_key).is_some_and(|record| {
            record.is_valid = false;
            true
        })
    }

    async fn purge_expired(&self, now: u64) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        before - sessions.len()
    }
}
