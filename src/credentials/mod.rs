//! OAuth credential bundle kept in a browser session.
//!
//! The bundle carries everything needed to rebuild an authenticated
//! YouTube client: the access token, the refresh token, the token endpoint
//! and the client identity used to refresh, the granted scopes and the
//! access-token expiry.
//!
//! Field names follow Google's authorized-user JSON so a bundle serialized
//! here can be read by other Google tooling and vice versa.
//!
//! ```
//! use comment_gateway::credentials::Credentials;
//!
//! # fn main() -> anyhow::Result<()> {
//! let json = r#"{
//!     "token": "ya29.access",
//!     "refresh_token": "1//refresh",
//!     "token_uri": "https://oauth2.googleapis.com/token",
//!     "client_id": "client.apps.googleusercontent.com",
//!     "client_secret": "secret",
//!     "scopes": ["https://www.googleapis.com/auth/youtube.force-ssl"],
//!     "expiry": "2030-01-01T00:00:00Z"
//! }"#;
//!
//! let creds = Credentials::from_json(json)?;
//! assert_eq!(Credentials::from_json(&creds.to_json()?)?, creds);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

mod encryption;

pub use encryption::{EncryptionKey, SealedCredentials};

/// Seconds before expiry at which the access token is refreshed.
const REFRESH_THRESHOLD_SECONDS: i64 = 90;

/// Credentials for calling the YouTube Data API on behalf of a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth access token (sent as bearer token)
    pub token: String,

    /// OAuth refresh token (present when `access_type=offline` was granted)
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refresh
    pub token_uri: String,

    pub client_id: String,

    pub client_secret: String,

    /// Scopes granted by the user
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the access token expires (UTC)
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Serialize the bundle for session storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize credentials")
    }

    /// Rebuild a bundle from its stored form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse stored credentials")
    }

    /// True once the access token's expiry has passed.
    ///
    /// Bundles without an expiry never report as expired.
    pub fn is_expired(&self) -> bool {
        self.expiry.map(|expiry| expiry <= Utc::now()).unwrap_or(false)
    }

    /// True when the access token expires within the refresh threshold and a
    /// refresh token is available to renew it.
    pub fn needs_refresh(&self) -> bool {
        match (&self.expiry, &self.refresh_token) {
            (Some(expiry), Some(_)) => {
                *expiry <= Utc::now() + Duration::seconds(REFRESH_THRESHOLD_SECONDS)
            }
            _ => false,
        }
    }
}
