use anyhow::{Context, Result};
use comment_gateway::api::{create_router, AppState};
use comment_gateway::config::{GatewayConfig, SessionBackend};
use comment_gateway::credentials::EncryptionKey;
use comment_gateway::session::{
    run_session_cleanup, MemorySessionStore, SessionStore, SqliteSessionStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comment_gateway=info".into()),
        )
        .init();

    info!("Comment gateway starting...");

    let config = GatewayConfig::from_env().context("Failed to load configuration")?;

    if config.server.allow_insecure_transport {
        warn!("Plain-HTTP OAuth transport enabled; never enable this in a deployed environment");
    }

    let sessions: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Sqlite => {
            let key = std::env::var("GATEWAY_ENCRYPTION_KEY").context(
                "GATEWAY_ENCRYPTION_KEY is required for the sqlite session backend (base64-encoded 32-byte key)",
            )?;
            let key = EncryptionKey::from_base64(&key).context("Invalid GATEWAY_ENCRYPTION_KEY")?;
            Arc::new(
                SqliteSessionStore::new(&config.session.database_path, key)
                    .context("Failed to initialize session store")?,
            )
        }
        SessionBackend::Memory => {
            warn!("In-memory session store: sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    info!(
        bind = %config.bind_addr(),
        redirect_uri = %config.redirect_uri(),
        session_backend = ?config.session.backend,
        "Configuration loaded"
    );

    tokio::spawn(run_session_cleanup(
        sessions.clone(),
        chrono::Duration::days(config.session.cookie_max_age_days),
        config.session.cleanup_interval_seconds,
    ));

    let bind_addr = config.bind_addr();
    let router = create_router(AppState::new(config, sessions))?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "Comment gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Comment gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl_c signal");
    }
    info!("Shutdown signal received");
}
