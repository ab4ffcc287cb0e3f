//! # Session Store Module
//!
//! Concurrent map from identity to session.
//!
//! # Locking discipline
//!
//! - The map itself sits behind one short-lived `std::sync::Mutex`, held only
//!   to look up, insert or remove an entry. It is never held across `.await`.
//! - Each session has its own `tokio::sync::Mutex`. Whoever mutates a session
//!   holds that lock for the whole read-modify-write, so events for the same
//!   identity are serialized while unrelated identities proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Mutex as SessionLock;
use tracing::{debug, info};

use crate::session::{Identity, Session};

pub type SessionHandle = Arc<SessionLock<Session>>;

pub struct SessionStore {
    sessions: Mutex<HashMap<Identity, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Identity, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the session for `identity`, creating it on first contact.
    ///
    /// Lookup and insertion happen under the same map lock, so concurrent first
    /// contacts from one identity always receive the same session.
    pub fn get_or_create(&self, identity: Identity) -> SessionHandle {
        let mut sessions = self.map();
        let handle = sessions.entry(identity).or_insert_with(|| {
            info!(user_id = %identity, "Creating new session");
            Arc::new(SessionLock::new(Session::new(identity)))
        });
        Arc::clone(handle)
    }

    /// Look up an existing session without creating one
    pub fn get(&self, identity: Identity) -> Option<SessionHandle> {
        self.map().get(&identity).cloned()
    }

    /// Replace the session for `identity`.
    ///
    /// The new value is written through the existing per-identity lock so a
    /// task already holding the old handle cannot write over it afterwards.
    pub async fn replace(&self, identity: Identity, session: Session) {
        let handle = self.get_or_create(identity);
        let mut current = handle.lock().await;
        *current = session;
        debug!(user_id = %identity, "Session replaced");
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many were evicted.
    ///
    /// A session that is locked or referenced by an in-flight event is kept.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.map();
        let before = sessions.len();
        sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => session.idle_for() <= ttl,
                Err(_) => true,
            }
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
