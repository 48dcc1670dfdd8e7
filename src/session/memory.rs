//! In-memory session store.

use super::{Session, SessionStore};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

struct StoredSession {
    session: Session,
    updated_at: DateTime<Utc>,
}

/// Session store backed by a concurrent map. Contents are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.session.clone()))
    }

    fn save(&self, session_id: &str, session: &Session) -> Result<()> {
        self.sessions.insert(
            session_id.to_string(),
            StoredSession {
                session: session.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn prune(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.updated_at >= cutoff);
        Ok(before.saturating_sub(self.sessions.len()))
    }
}
