//! Live session bookkeeping shared by the acceptor and the tick.

use super::{Session, SessionId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// All sessions whose connection is currently accepted.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        debug!("Registering session {} from {}", session.id(), session.remote_addr());
        self.sessions.insert(session.id(), session);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Copies out the current sessions so callers never hold a shard lock
    /// while working on them.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Closes and forgets every session.
    pub fn close_all(&self) -> usize {
        let sessions = self.snapshot();
        for session in &sessions {
            session.close();
        }
        self.sessions.clear();
        sessions.len()
    }
}
