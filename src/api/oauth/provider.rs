//! OAuth client configuration for Google's authorization server.
//!
//! Client credentials come either from the environment or from the
//! client-secrets JSON downloaded from the Google Cloud console. They are
//! resolved on every authorization request so a broken or missing secrets
//! file is reported to the caller instead of stopping the server.

use crate::config::OAuthConfig;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// OAuth provider configuration
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,

    /// OAuth authorization endpoint URL
    pub auth_uri: String,

    /// OAuth token exchange endpoint URL
    pub token_uri: String,

    /// Requested OAuth scopes
    pub scopes: Vec<String>,
}

/// Google client-secrets file (`{"web": {..}}` or `{"installed": {..}}`)
#[derive(Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

#[derive(Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl OAuthClientConfig {
    /// Resolve the client configuration.
    ///
    /// Inline `client_id`/`client_secret` win; otherwise the secrets file is
    /// read.
    pub fn resolve(config: &OAuthConfig) -> Result<Self> {
        if let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret) {
            return Ok(Self {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                auth_uri: config.auth_uri.clone(),
                token_uri: config.token_uri.clone(),
                scopes: config.scopes.clone(),
            });
        }

        let contents = std::fs::read_to_string(&config.client_secrets_file).with_context(|| {
            format!(
                "Failed to read client secrets file '{}'",
                config.client_secrets_file
            )
        })?;
        Self::from_client_secrets(&contents, config)
    }

    /// Parse a client-secrets document. Endpoints missing from the document
    /// fall back to the configured ones.
    pub fn from_client_secrets(json: &str, config: &OAuthConfig) -> Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_str(json).context("Failed to parse client secrets")?;
        let secrets = file
            .web
            .or(file.installed)
            .ok_or_else(|| anyhow!("Client secrets must contain a 'web' or 'installed' client"))?;

        Ok(Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            auth_uri: secrets.auth_uri.unwrap_or_else(|| config.auth_uri.clone()),
            token_uri: secrets.token_uri.unwrap_or_else(|| config.token_uri.clone()),
            scopes: config.scopes.clone(),
        })
    }

    /// Build the authorization URL for an offline grant.
    pub fn build_auth_url(&self, state: &str, redirect_uri: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&access_type=offline&include_granted_scopes=true",
            self.auth_uri,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    /// Check that every URL taking part in the flow uses HTTPS.
    pub fn ensure_secure(&self, redirect_uri: &str, allow_insecure: bool) -> Result<()> {
        ensure_secure_transport(redirect_uri, allow_insecure)?;
        ensure_secure_transport(&self.auth_uri, allow_insecure)?;
        ensure_secure_transport(&self.token_uri, allow_insecure)
    }
}

/// Reject plain-HTTP URLs unless the insecure-transport override is on.
pub fn ensure_secure_transport(url: &str, allow_insecure: bool) -> Result<()> {
    if allow_insecure || url.starts_with("https://") {
        return Ok(());
    }
    Err(anyhow!(
        "Insecure transport: OAuth 2 requires https, got '{}'",
        url
    ))
}

/// Generate an anti-forgery `state` nonce.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
