//! Per-session mutual exclusion.
//!
//! The coordinator serializes "read bitmap -> write chunk -> update
//! bitmap -> completion check -> maybe merge" per session. Locks are
//! keyed by session id so chunks of *different* sessions proceed fully
//! in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// A mutex keyed by session id.
#[derive(Clone, Debug, Default)]
pub struct SessionLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one session. Released when the guard drops.
    pub async fn lock(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Drop lock entries no task currently holds. Called after session
    /// deletion so the map does not grow with dead sessions.
    pub fn release(&self, session_id: Uuid) {
        self.locks
            .remove_if(&session_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
