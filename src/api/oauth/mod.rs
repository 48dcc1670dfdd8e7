//! OAuth 2.0 authorization-code flow against Google.
//!
//! 1. Browser opens `GET /login` → nonce stored in session, redirect to Google
//! 2. User grants access to their YouTube account
//! 3. Google redirects to `GET /callback?state=..&code=..`
//! 4. Nonce checked, code exchanged, credential bundle stored in session

pub mod exchange;
pub mod provider;

use super::{AppError, AppState, MessageResponse, SessionContext};
use crate::config::CookieSameSite;
use crate::session::new_session_id;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use provider::OAuthClientConfig;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// OAuth callback query parameters
#[derive(Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Resolve the client configuration and check transport security.
fn oauth_client(state: &AppState, redirect_uri: &str) -> Result<OAuthClientConfig, AppError> {
    let client = OAuthClientConfig::resolve(&state.config.oauth).map_err(|e| {
        error!(error = %e, "OAuth client configuration unavailable");
        AppError::ServerError(format!("{:#}", e))
    })?;

    client
        .ensure_secure(redirect_uri, state.config.server.allow_insecure_transport)
        .map_err(|e| {
            error!(error = %e, "Refusing insecure OAuth transport");
            AppError::ServerError(e.to_string())
        })?;

    Ok(client)
}

/// GET /login
///
/// Starts the flow: stores a fresh `state` nonce in the session (minting a
/// session cookie if the browser has none) and answers 302 to Google's
/// authorization page.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut ctx: SessionContext,
) -> Result<(CookieJar, Response), AppError> {
    let redirect_uri = state.config.redirect_uri();
    debug!(redirect_uri = %redirect_uri, "OAuth login requested");

    let client = oauth_client(&state, &redirect_uri)?;

    let nonce = provider::generate_state();
    let auth_url = client.build_auth_url(&nonce, &redirect_uri);

    let session_id = ctx.id.take().unwrap_or_else(new_session_id);
    ctx.session.begin_authorization(nonce);
    state.save_session(&session_id, &ctx.session)?;

    let session_config = &state.config.session;
    let same_site = match session_config.cookie_same_site {
        CookieSameSite::Strict => SameSite::Strict,
        CookieSameSite::Lax => SameSite::Lax,
        CookieSameSite::None => SameSite::None,
    };
    // Browsers drop `SameSite=None` cookies that are not `Secure`
    let secure = !state.config.server.allow_insecure_transport || same_site == SameSite::None;
    let cookie = Cookie::build((session_config.cookie_name.clone(), session_id))
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .path("/")
        .max_age(time::Duration::days(session_config.cookie_max_age_days))
        .build();

    info!("Redirecting to OAuth provider");

    let redirect = (StatusCode::FOUND, [(header::LOCATION, auth_url)]).into_response();
    Ok((jar.add(cookie), redirect))
}

/// GET /callback
///
/// Finishes the flow. Requires the nonce from `/login` in the same session;
/// an unparseable query string is a bad request and every later failure
/// (provider error, nonce mismatch, token exchange) is an upstream failure.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    mut ctx: SessionContext,
    query: Result<Query<OAuthCallback>, QueryRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let (Some(session_id), Some(expected_state)) = (ctx.id.clone(), ctx.session.state.clone())
    else {
        warn!("OAuth callback without pending authorization");
        return Err(AppError::BadRequest("State is missing from session".to_string()));
    };

    let Query(callback) = query.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed OAuth callback query");
        AppError::BadRequest(rejection.body_text())
    })?;

    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "OAuth authorization failed");
        return Err(AppError::ServerError(format!(
            "OAuth authorization failed: {} - {}",
            error, description
        )));
    }

    if callback.state.as_deref() != Some(expected_state.as_str()) {
        warn!("OAuth state mismatch");
        return Err(AppError::ServerError(
            "Mismatching state: CSRF check failed, state not equal in request and response"
                .to_string(),
        ));
    }

    let code = callback
        .code
        .ok_or_else(|| AppError::ServerError("Missing 'code' parameter".to_string()))?;

    let redirect_uri = state.config.redirect_uri();
    let client = oauth_client(&state, &redirect_uri)?;

    let credentials = exchange::exchange_code(&state.http_client, &client, &code, &redirect_uri)
        .await
        .map_err(|e| {
            error!(error = %e, "Token exchange failed");
            AppError::ServerError(format!("Failed to exchange authorization code: {}", e))
        })?;

    let has_refresh_token = credentials.refresh_token.is_some();
    ctx.session.complete_authorization(credentials);
    state.save_session(&session_id, &ctx.session)?;

    info!(has_refresh_token, "OAuth flow completed successfully");

    Ok(Json(MessageResponse {
        message: "Login successful! Now you can fetch comments.".to_string(),
    }))
}
