//! In-memory session registry
//!
//! The registry is the single shared structure of the engine. The outer map
//! is guarded by an async `RwLock` that is never held across an await; each
//! session's mutable state sits behind its own `Mutex` so that ledger calls
//! for one session never stall cycles for another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use mentora_types::SessionId;

use crate::session::BillingSession;

/// One registered session: lock-free liveness flag plus locked state
pub struct SessionEntry {
    session_id: SessionId,
    active: AtomicBool,
    state: Mutex<BillingSession>,
}

impl SessionEntry {
    fn new(session: BillingSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            active: AtomicBool::new(session.state.is_active()),
            state: Mutex::new(session),
        }
    }

    /// Identifier of the session this entry tracks
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Whether the session still participates in billing cycles
    ///
    /// Readable without taking the state lock, so scheduler scans skip
    /// terminated sessions even while a slow cycle holds the lock.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Clone the current session state
    pub async fn snapshot(&self) -> BillingSession {
        self.state.lock().await.clone()
    }

    /// Lock the session state for a billing cycle or lifecycle transition
    ///
    /// The guard is held across ledger awaits; that is what serializes all
    /// work on one session.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, BillingSession> {
        self.state.lock().await
    }

    /// Drop the entry out of scheduler scans
    ///
    /// Called while holding the state lock, immediately after the state
    /// itself turns terminal, so a concurrent scan never observes an
    /// active flag on a terminal session for longer than the lock hold.
    pub(crate) fn mark_inactive(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("session_id", &self.session_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Registry of all sessions known to the engine, keyed by session id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, or return the existing entry for its id
    ///
    /// The boolean is `true` when this call created the entry. Concurrent
    /// starts for the same id race to the write lock and all but one land
    /// on the existing entry.
    pub async fn start_or_get(&self, session: BillingSession) -> (Arc<SessionEntry>, bool) {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(session.session_id.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => (Arc::clone(e.get()), false),
            std::collections::hash_map::Entry::Vacant(v) => {
                let entry = Arc::new(SessionEntry::new(session));
                v.insert(Arc::clone(&entry));
                (entry, true)
            }
        }
    }

    /// Look up a session by id
    pub async fn get(&self, session_id: &SessionId) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Entries still participating in billing cycles
    pub async fn active_entries(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect()
    }

    /// Clone the state of every registered session
    pub async fn snapshots(&self) -> Vec<BillingSession> {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            out.push(entry.snapshot().await);
        }
        out
    }

    /// Remove a session outright, returning whether it was present
    pub async fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Evict terminated sessions whose grace window has passed
    ///
    /// Returns the ids that were evicted. Terminal entries are uncontended,
    /// so the per-entry locks resolve immediately.
    pub async fn sweep_ended(&self, now: DateTime<Utc>, grace: Duration) -> Vec<SessionId> {
        let ended: Vec<_> = {
            self.sessions
                .read()
                .await
                .values()
                .filter(|e| !e.is_active())
                .cloned()
                .collect()
        };
        let mut expired = Vec::new();
        for entry in ended {
            let session = entry.lock().await;
            if let Some(ended_at) = session.ended_at {
                let age = (now - ended_at).to_std().unwrap_or(Duration::ZERO);
                if age >= grace {
                    expired.push(session.session_id.clone());
                }
            }
        }
        if expired.is_empty() {
            return expired;
        }
        let mut sessions = self.sessions.write().await;
        expired.retain(|id| sessions.remove(id).is_some());
        expired
    }

    /// Number of registered sessions, terminated ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry holds no sessions at all
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}
