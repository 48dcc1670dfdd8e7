//! Durable session store using SQLite.
//!
//! Sessions survive process restarts. The credential bundle is sealed with
//! AES-256-GCM before it touches disk; the OAuth nonce is stored as is.

use super::{Session, SessionStore};
use crate::credentials::{EncryptionKey, SealedCredentials};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Session store backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE sessions (
///     id TEXT PRIMARY KEY,
///     state TEXT,                 -- OAuth nonce (optional)
///     credentials TEXT,           -- Encrypted bundle (optional)
///     credentials_nonce TEXT,     -- Nonce for credentials (optional)
///     created_at TEXT NOT NULL,   -- RFC 3339 UTC, millisecond precision
///     updated_at TEXT NOT NULL    -- RFC 3339 UTC, millisecond precision
/// );
/// ```
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    encryption_key: EncryptionKey,
}

impl SqliteSessionStore {
    /// Creates or opens a session database.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    /// * `encryption_key` - Key sealing the credential bundles
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: EncryptionKey) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open session database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                state TEXT,
                credentials TEXT,
                credentials_nonce TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create sessions table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Session database lock poisoned"))
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT state, credentials, credentials_nonce FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query session")?;

        let Some((state, ciphertext, nonce)) = row else {
            return Ok(None);
        };

        let credentials = match (ciphertext, nonce) {
            (Some(ciphertext), Some(nonce)) => Some(
                SealedCredentials { ciphertext, nonce }
                    .open(&self.encryption_key)
                    .context("Failed to decrypt session credentials")?,
            ),
            _ => None,
        };

        Ok(Some(Session { state, credentials }))
    }

    fn save(&self, session_id: &str, session: &Session) -> Result<()> {
        let sealed = session
            .credentials
            .as_ref()
            .map(|creds| SealedCredentials::seal(creds, &self.encryption_key))
            .transpose()
            .context("Failed to encrypt session credentials")?;
        let (ciphertext, nonce) = match sealed {
            Some(sealed) => (Some(sealed.ciphertext), Some(sealed.nonce)),
            None => (None, None),
        };

        let now = timestamp(Utc::now());

        self.conn()?
            .execute(
                r#"
                INSERT INTO sessions (id, state, credentials, credentials_nonce, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    state = excluded.state,
                    credentials = excluded.credentials,
                    credentials_nonce = excluded.credentials_nonce,
                    updated_at = excluded.updated_at
                "#,
                params![session_id, session.state, ciphertext, nonce, now, now],
            )
            .context("Failed to store session")?;

        Ok(())
    }

    fn prune(&self, max_age: Duration) -> Result<usize> {
        let cutoff = timestamp(Utc::now() - max_age);
        self.conn()?
            .execute("DELETE FROM sessions WHERE updated_at < ?1", params![cutoff])
            .context("Failed to prune sessions")
    }
}

/// Fixed-width timestamps so that SQL string comparison orders them in time.
fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
