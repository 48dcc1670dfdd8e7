//! Per-browser session state.
//!
//! A session moves through three states:
//!
//! ```text
//! Anonymous --(/login)--> AwaitingCallback --(/callback)--> Authenticated
//! ```
//!
//! `AwaitingCallback` holds the OAuth anti-forgery nonce; `Authenticated`
//! holds the credential bundle. There is no expiry transition: a revoked or
//! expired grant only shows up as a failed API call. Sessions untouched for
//! longer than the cookie lifetime are pruned by [`run_session_cleanup`].
//!
//! Storage is behind [`SessionStore`] so the router can run on an in-memory
//! map in tests and on SQLite in production.

use crate::credentials::Credentials;
use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Server-side state for one browser session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    /// OAuth `state` nonce issued by `/login`, awaiting `/callback`
    pub state: Option<String>,

    /// Credential bundle obtained by `/callback`
    pub credentials: Option<Credentials>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Record the nonce of a new authorization request.
    ///
    /// Existing credentials are left in place until the new grant completes.
    pub fn begin_authorization(&mut self, state: String) {
        self.state = Some(state);
    }

    /// Replace the pending nonce with the granted credentials.
    pub fn complete_authorization(&mut self, credentials: Credentials) {
        self.state = None;
        self.credentials = Some(credentials);
    }
}

/// Session persistence keyed by the opaque id carried in the session cookie.
///
/// Writes are last-write-wins; a single browser drives its session
/// sequentially.
pub trait SessionStore: Send + Sync {
    /// Load a session. `Ok(None)` when the id is unknown.
    fn load(&self, session_id: &str) -> Result<Option<Session>>;

    /// Insert or replace a session.
    fn save(&self, session_id: &str, session: &Session) -> Result<()>;

    /// Delete sessions last saved more than `max_age` ago. Returns how many
    /// were removed.
    fn prune(&self, max_age: Duration) -> Result<usize>;
}

/// Mint a new opaque session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Background task pruning sessions whose cookie can no longer be presented
pub async fn run_session_cleanup(
    store: Arc<dyn SessionStore>,
    max_age: Duration,
    interval_seconds: u64,
) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds.max(1)));

    loop {
        interval.tick().await;
        match store.prune(max_age) {
            Ok(removed) => tracing::debug!(removed, "Session cleanup complete"),
            Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
        }
    }
}
