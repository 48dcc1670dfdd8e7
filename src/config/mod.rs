use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL of this deployment; the OAuth redirect target is
    /// `<base_url>/callback`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Origin of the front-end application allowed to call the API with
    /// its session cookie
    #[serde(default)]
    pub frontend_origin: Option<String>,
    /// Permit plain-HTTP OAuth endpoints and redirect URIs. Local testing only.
    #[serde(default)]
    pub allow_insecure_transport: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            frontend_origin: None,
            allow_insecure_transport: false,
        }
    }
}

/// OAuth client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Google client-secrets JSON downloaded from the cloud console
    #[serde(default = "default_client_secrets_file")]
    pub client_secrets_file: String,
    /// Inline client id; together with `client_secret` it takes precedence
    /// over the secrets file
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_client_secrets_file() -> String {
    "client_secrets.json".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/youtube.force-ssl".to_string()]
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_secrets_file: default_client_secrets_file(),
            client_id: None,
            client_secret: None,
            scopes: default_scopes(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        }
    }
}

/// Where session state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Sqlite,
    Memory,
}

impl std::str::FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SessionBackend::Sqlite),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(anyhow!("Unknown session backend '{}'", other)),
        }
    }
}

/// `SameSite` attribute of the session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieSameSite {
    Strict,
    Lax,
    /// Needed when the front end lives on another site; forces `Secure`
    None,
}

impl std::str::FromStr for CookieSameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(CookieSameSite::Strict),
            "lax" => Ok(CookieSameSite::Lax),
            "none" => Ok(CookieSameSite::None),
            other => Err(anyhow!("Unknown SameSite policy '{}'", other)),
        }
    }
}

/// Session storage and cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_backend")]
    pub backend: SessionBackend,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: i64,
    #[serde(default = "default_cookie_same_site")]
    pub cookie_same_site: CookieSameSite,
    /// How often sessions older than the cookie lifetime are pruned
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_backend() -> SessionBackend {
    SessionBackend::Sqlite
}

fn default_database_path() -> String {
    "sessions.db".to_string()
}

fn default_cookie_name() -> String {
    "gateway_session".to_string()
}

fn default_cookie_max_age_days() -> i64 {
    30
}

fn default_cookie_same_site() -> CookieSameSite {
    CookieSameSite::Lax
}

fn default_cleanup_interval_seconds() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_path: default_database_path(),
            cookie_name: default_cookie_name(),
            cookie_max_age_days: default_cookie_max_age_days(),
            cookie_same_site: default_cookie_same_site(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// YouTube Data API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Page size for comment listing (the API caps it at 100)
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_max_results() -> u32 {
    100
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_results: default_max_results(),
        }
    }
}

impl YouTubeConfig {
    /// Page size clamped to what the API accepts.
    pub fn page_size(&self) -> u32 {
        self.max_results.clamp(1, 100)
    }
}

impl GatewayConfig {
    /// Load from `GATEWAY_CONFIG` (if set) and apply environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("GATEWAY_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => GatewayConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GATEWAY_BASE_URL") {
            self.server.base_url = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", v))?;
        }
        if let Some(v) = lookup("GATEWAY_FRONTEND_ORIGIN") {
            self.server.frontend_origin = Some(v);
        }
        if let Some(v) = lookup("GATEWAY_INSECURE_TRANSPORT") {
            self.server.allow_insecure_transport = matches!(v.as_str(), "1" | "true" | "TRUE");
        }
        if let Some(v) = lookup("GATEWAY_CLIENT_SECRETS_FILE") {
            self.oauth.client_secrets_file = v;
        }
        if let Some(v) = lookup("GATEWAY_CLIENT_ID") {
            self.oauth.client_id = Some(v);
        }
        if let Some(v) = lookup("GATEWAY_CLIENT_SECRET") {
            self.oauth.client_secret = Some(v);
        }
        if let Some(v) = lookup("GATEWAY_SESSION_BACKEND") {
            self.session.backend = v.parse()?;
        }
        if let Some(v) = lookup("GATEWAY_SESSION_DB") {
            self.session.database_path = v;
        }
        if let Some(v) = lookup("GATEWAY_COOKIE_SAME_SITE") {
            self.session.cookie_same_site = v.parse()?;
        }
        Ok(())
    }

    /// OAuth redirect target derived from the deployment base URL.
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.server.base_url.trim_end_matches('/'))
    }

    /// Address the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: GatewayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file '{}'", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 5001);
        assert!(!config.server.allow_insecure_transport);
        assert_eq!(config.oauth.client_secrets_file, "client_secrets.json");
        assert_eq!(
            config.oauth.scopes,
            vec!["https://www.googleapis.com/auth/youtube.force-ssl"]
        );
        assert_eq!(config.session.backend, SessionBackend::Sqlite);
        assert_eq!(config.youtube.max_results, 100);
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:5001/callback");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            base_url = "https://moderator.example.com/"
            frontend_origin = "https://app.example.com"

            [oauth]
            client_secrets_file = "/etc/gateway/secrets.json"
            scopes = ["a", "b"]

            [session]
            backend = "memory"
            cookie_name = "sid"
            cookie_same_site = "none"

            [youtube]
            max_results = 50
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.redirect_uri(), "https://moderator.example.com/callback");
        assert_eq!(config.server.frontend_origin.as_deref(), Some("https://app.example.com"));
        assert_eq!(config.oauth.scopes, vec!["a", "b"]);
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.cookie_max_age_days, 30); // Default
        assert_eq!(config.session.cookie_same_site, CookieSameSite::None);
        assert_eq!(config.session.cleanup_interval_seconds, 3600); // Default
        assert_eq!(config.youtube.page_size(), 50);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5001");
        assert_eq!(config.oauth.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(config.session.cookie_same_site, CookieSameSite::Lax);
    }

    #[test]
    fn test_page_size_clamped() {
        let mut youtube = YouTubeConfig::default();
        youtube.max_results = 500;
        assert_eq!(youtube.page_size(), 100);
        youtube.max_results = 0;
        assert_eq!(youtube.page_size(), 1);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GATEWAY_BASE_URL", "https://gw.example.com"),
            ("PORT", "9000"),
            ("GATEWAY_INSECURE_TRANSPORT", "1"),
            ("GATEWAY_CLIENT_ID", "cid"),
            ("GATEWAY_CLIENT_SECRET", "csecret"),
            ("GATEWAY_SESSION_BACKEND", "memory"),
            ("GATEWAY_COOKIE_SAME_SITE", "Strict"),
        ]);

        let mut config = GatewayConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.redirect_uri(), "https://gw.example.com/callback");
        assert_eq!(config.server.port, 9000);
        assert!(config.server.allow_insecure_transport);
        assert_eq!(config.oauth.client_id.as_deref(), Some("cid"));
        assert_eq!(config.oauth.client_secret.as_deref(), Some("csecret"));
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!(config.session.cookie_same_site, CookieSameSite::Strict);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let mut config = GatewayConfig::default();
        assert!(config
            .apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()))
            .is_err());

        let mut config = GatewayConfig::default();
        assert!(config
            .apply_overrides(|key| (key == "GATEWAY_SESSION_BACKEND").then(|| "redis".to_string()))
            .is_err());

        let mut config = GatewayConfig::default();
        assert!(config
            .apply_overrides(|key| (key == "GATEWAY_COOKIE_SAME_SITE").then(|| "loose".to_string()))
            .is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[server]\nport = 7000\n").unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 7000);

        assert!(load_config(dir.path().join("missing.toml").to_str().unwrap()).is_err());
    }
}
