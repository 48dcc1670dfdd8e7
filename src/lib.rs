// Configuration (TOML file + environment overrides)
pub mod config;

// OAuth credential bundle and at-rest encryption
pub mod credentials;

// Per-browser session state and its storage backends
pub mod session;

// YouTube Data API client
pub mod youtube;

// Keyword flagging of comments
pub mod moderation;

// HTTP API
pub mod api;
