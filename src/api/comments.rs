//! Comment listing and deletion, forwarded to the YouTube Data API with the
//! session's credentials.

use super::{AppError, AppState, MessageResponse, SessionContext};
use crate::api::oauth::exchange;
use crate::credentials::Credentials;
use crate::moderation::{self, CommentRecord};
use crate::youtube::YouTubeClient;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Request body of `POST /get_comments`
#[derive(Debug, Default, Deserialize)]
pub struct GetCommentsRequest {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

/// Response body of `POST /get_comments`
#[derive(Serialize)]
pub struct GetCommentsResponse {
    pub comments: Vec<CommentRecord>,
}

/// Request body of `POST /delete_comment`
#[derive(Debug, Default, Deserialize)]
pub struct DeleteCommentRequest {
    #[serde(default)]
    pub comment_id: Option<String>,
}

/// POST /get_comments
///
/// Lists one page of top-level comments and flags those containing any
/// keyword.
pub async fn get_comments(
    State(state): State<Arc<AppState>>,
    mut ctx: SessionContext,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GetCommentsResponse>, AppError> {
    let credentials = require_credentials(&ctx)?;

    let request: GetCommentsRequest = parse_body(&read_body(body)?)?;
    let video_id = non_empty(request.video_id)
        .ok_or_else(|| AppError::BadRequest("Missing video_id parameter".to_string()))?;
    let keywords = request.keywords.unwrap_or_default();

    let client = youtube_client(&state, &mut ctx, credentials).await?;
    let page = client
        .list_comment_threads(&video_id, state.config.youtube.page_size())
        .await
        .map_err(|e| {
            error!(video_id = %video_id, error = %e, "Failed to list comments");
            AppError::ServerError(e.to_string())
        })?;

    let comments = moderation::annotate(&page.items, &keywords);
    let flagged = comments.iter().filter(|c| c.spam).count();

    info!(
        video_id = %video_id,
        keywords = keywords.len(),
        comments = comments.len(),
        flagged,
        "Comments fetched"
    );

    Ok(Json(GetCommentsResponse { comments }))
}

/// POST /delete_comment
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    mut ctx: SessionContext,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let credentials = require_credentials(&ctx)?;

    let request: DeleteCommentRequest = parse_body(&read_body(body)?)?;
    let comment_id = non_empty(request.comment_id)
        .ok_or_else(|| AppError::BadRequest("Missing comment_id parameter".to_string()))?;

    let client = youtube_client(&state, &mut ctx, credentials).await?;
    client.delete_comment(&comment_id).await.map_err(|e| {
        error!(comment_id = %comment_id, error = %e, "Failed to delete comment");
        AppError::ServerError(e.to_string())
    })?;

    info!(comment_id = %comment_id, "Comment deleted");

    Ok(Json(MessageResponse {
        message: "Comment deleted successfully".to_string(),
    }))
}

/// Reject before anything else when the session has no credentials.
fn require_credentials(ctx: &SessionContext) -> Result<Credentials, AppError> {
    ctx.session
        .credentials
        .clone()
        .ok_or_else(|| AppError::Unauthorized("User not logged in".to_string()))
}

/// Surface a body that could not be buffered (e.g. over the size limit) as a
/// JSON error once the caller is known to be logged in.
fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, AppError> {
    body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Failed to read request body");
        AppError::BadRequest(rejection.body_text())
    })
}

/// Parse a JSON body; an empty body counts as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejected malformed request body");
        AppError::BadRequest("Invalid JSON body".to_string())
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Build an authenticated client, refreshing the access token first when it
/// is about to expire. A refreshed bundle is written back to the session.
async fn youtube_client(
    state: &AppState,
    ctx: &mut SessionContext,
    credentials: Credentials,
) -> Result<YouTubeClient, AppError> {
    let credentials = if credentials.needs_refresh() {
        debug!(expired = credentials.is_expired(), "Refreshing access token");
        let refreshed = exchange::refresh_credentials(&state.http_client, &credentials)
            .await
            .map_err(|e| {
                error!(error = %e, "Access token refresh failed");
                AppError::ServerError(format!("Failed to refresh access token: {}", e))
            })?;

        if let Some(session_id) = ctx.id.as_deref() {
            ctx.session.credentials = Some(refreshed.clone());
            state.save_session(session_id, &ctx.session)?;
        }
        info!("Access token refreshed");
        refreshed
    } else {
        credentials
    };

    Ok(YouTubeClient::from_credentials(
        state.http_client.clone(),
        &state.config.youtube.api_base_url,
        &credentials,
    ))
}
