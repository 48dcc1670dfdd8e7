//! HTTP API of the comment moderation gateway.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | liveness text |
//! | `GET /login` | start the OAuth authorization-code flow |
//! | `GET /callback` | finish the flow and store credentials in the session |
//! | `POST /get_comments` | list and flag top-level comments of a video |
//! | `POST /delete_comment` | delete a comment |
//! | `GET /get_status` | whether the session holds credentials |
//!
//! Every failure is rendered once, here, as `{"error": message}`.

pub mod comments;
pub mod oauth;


use crate::config::GatewayConfig;
use crate::session::{Session, SessionStore};
use anyhow::{Context, Result};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types, mapped to status codes at the boundary
#[derive(Debug)]
pub enum AppError {
    /// Missing parameter or missing session state
    BadRequest(String),
    /// No credentials in the session
    Unauthorized(String),
    /// Upstream (token endpoint, YouTube API) or configuration failure
    ServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Plain acknowledgement body
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub sessions: Arc<dyn SessionStore>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            sessions,
            http_client: reqwest::Client::new(),
        }
    }

    /// Persist a session, mapping storage failures to a server error.
    pub(crate) fn save_session(&self, session_id: &str, session: &Session) -> Result<(), AppError> {
        self.sessions.save(session_id, session).map_err(|e| {
            error!(error = %e, "Failed to store session");
            AppError::ServerError(format!("Failed to store session: {}", e))
        })
    }
}

/// The caller's session, resolved from the session cookie.
///
/// A request without the cookie, or with an id the store does not know or
/// cannot read, gets an empty anonymous session and `id: None` / the
/// presented id.
pub struct SessionContext {
    pub id: Option<String>,
    pub session: Session,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(id) = jar
            .get(&state.config.session.cookie_name)
            .map(|cookie| cookie.value().to_string())
        else {
            return Ok(Self {
                id: None,
                session: Session::default(),
            });
        };

        // An unreadable row (rotated key, corruption) counts as anonymous;
        // the next /login overwrites it under the same id.
        let session = match state.sessions.load(&id) {
            Ok(session) => session.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session");
                Session::default()
            }
        };

        Ok(Self {
            id: Some(id),
            session,
        })
    }
}

/// Status probe response
#[derive(Serialize)]
pub struct StatusResponse {
    pub logged_in: bool,
}

/// Create the gateway router
pub fn create_router(state: AppState) -> Result<Router> {
    let cors = state
        .config
        .server
        .frontend_origin
        .as_deref()
        .map(frontend_cors)
        .transpose()?;

    let router = Router::new()
        .route("/", get(index))
        .route("/login", get(oauth::login))
        .route("/callback", get(oauth::callback))
        .route("/get_comments", post(comments::get_comments))
        .route("/delete_comment", post(comments::delete_comment))
        .route("/get_status", get(get_status))
        .with_state(Arc::new(state));

    Ok(match cors {
        Some(layer) => router.layer(layer),
        None => router,
    })
}

/// CORS allowance for the front-end application, cookies included.
fn frontend_cors(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("Invalid frontend origin '{}'", origin))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// GET /
async fn index() -> &'static str {
    "YouTube Comment Cleaner API Running!"
}

/// GET /get_status
///
/// Reports only whether credentials are present; never validates or
/// refreshes them.
async fn get_status(ctx: SessionContext) -> Json<StatusResponse> {
    Json(StatusResponse {
        logged_in: ctx.session.is_authenticated(),
    })
}
