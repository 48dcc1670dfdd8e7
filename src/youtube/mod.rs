//! Client for the two YouTube Data API v3 calls the gateway forwards:
//! listing top-level comment threads on a video and deleting a comment.

use crate::credentials::Credentials;
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

/// One page of `commentThreads.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadList {
    #[serde(default)]
    pub items: Vec<CommentThread>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A top-level comment and its thread metadata.
#[derive(Debug, Deserialize)]
pub struct CommentThread {
    /// Thread id; equal to the top-level comment's id
    pub id: String,
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub top_level_comment: Comment,
}

/// The top-level comment; its id is the thread id, so only the snippet is kept.
#[derive(Debug, Deserialize)]
pub struct Comment {
    pub snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    pub text_display: String,
    #[serde(default)]
    pub author_display_name: String,
}

/// Google API error envelope: `{"error": {"code": .., "message": ..}}`
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Authenticated YouTube Data API client.
pub struct YouTubeClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl YouTubeClient {
    /// Build a client from a stored credential bundle.
    pub fn from_credentials(http_client: Client, base_url: &str, credentials: &Credentials) -> Self {
        Self {
            access_token: credentials.token.clone(),
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a single page of top-level comment threads for a video.
    pub async fn list_comment_threads(
        &self,
        video_id: &str,
        max_results: u32,
    ) -> Result<CommentThreadList> {
        let url = format!("{}/commentThreads", self.base_url);
        let max_results = max_results.to_string();
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("part", "snippet"),
                ("videoId", video_id),
                ("textFormat", "plainText"),
                ("maxResults", max_results.as_str()),
            ])
            .send()
            .await
            .context("Failed to send commentThreads.list request")?;

        let response = check_response(response).await?;
        let page: CommentThreadList = response
            .json()
            .await
            .context("Failed to parse commentThreads.list response")?;

        debug!(
            video_id = %video_id,
            count = page.items.len(),
            has_more = page.next_page_token.is_some(),
            "Fetched comment threads"
        );

        Ok(page)
    }

    /// Delete a comment by id.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let url = format!("{}/comments", self.base_url);
        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .query(&[("id", comment_id)])
            .send()
            .await
            .context("Failed to send comments.delete request")?;

        check_response(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into an error carrying Google's message.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or(body);

    Err(anyhow!("YouTube API error ({}): {}", status, message))
}
