//! OAuth token endpoint calls.
//!
//! Exchanges an authorization code for a credential bundle and refreshes an
//! expiring bundle with its refresh token.

use super::provider::OAuthClientConfig;
use crate::credentials::Credentials;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Space-separated granted scopes
    #[serde(default)]
    scope: Option<String>,
}

/// OAuth error response (RFC 6749 §5.2)
#[derive(Deserialize, Debug)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for a credential bundle.
///
/// `redirect_uri` must be the one used in the authorization request.
pub async fn exchange_code(
    http_client: &reqwest::Client,
    client: &OAuthClientConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<Credentials> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
    ];

    tracing::debug!("Exchanging authorization code for token at {}", client.token_uri);

    let token = post_token_form(http_client, &client.token_uri, &form).await?;

    tracing::debug!(
        "Token exchange successful, has_refresh_token={}, expires_in={:?}",
        token.refresh_token.is_some(),
        token.expires_in
    );

    Ok(Credentials {
        token: token.access_token,
        refresh_token: token.refresh_token,
        token_uri: client.token_uri.clone(),
        client_id: client.client_id.clone(),
        client_secret: client.client_secret.clone(),
        scopes: granted_scopes(token.scope.as_deref(), &client.scopes),
        expiry: token.expires_in.map(|seconds| Utc::now() + Duration::seconds(seconds)),
    })
}

/// Refresh an access token using only what the bundle carries.
///
/// The provider may or may not rotate the refresh token; the old one is kept
/// when no new one is returned.
pub async fn refresh_credentials(
    http_client: &reqwest::Client,
    credentials: &Credentials,
) -> Result<Credentials> {
    let refresh_token = credentials
        .refresh_token
        .as_deref()
        .ok_or_else(|| anyhow!("Credentials have no refresh token"))?;

    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
    ];

    let token = post_token_form(http_client, &credentials.token_uri, &form).await?;

    Ok(Credentials {
        token: token.access_token,
        refresh_token: token
            .refresh_token
            .or_else(|| credentials.refresh_token.clone()),
        token_uri: credentials.token_uri.clone(),
        client_id: credentials.client_id.clone(),
        client_secret: credentials.client_secret.clone(),
        scopes: granted_scopes(token.scope.as_deref(), &credentials.scopes),
        expiry: token.expires_in.map(|seconds| Utc::now() + Duration::seconds(seconds)),
    })
}

async fn post_token_form(
    http_client: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http_client
        .post(token_uri)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .context("Failed to send token request")?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{} - {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(anyhow!("Token request failed with status {}: {}", status, reason));
    }

    response
        .json()
        .await
        .context("Failed to parse token response")
}

fn granted_scopes(scope: Option<&str>, requested: &[String]) -> Vec<String> {
    match scope {
        Some(scope) if !scope.trim().is_empty() => {
            scope.split_whitespace().map(str::to_string).collect()
        }
        _ => requested.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(token_uri: String) -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri,
            scopes: vec!["https://www.googleapis.com/auth/youtube.force-ssl".to_string()],
        }
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "ya29.a0",
            "refresh_token": "1//0g",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/youtube.force-ssl",
            "token_type": "Bearer"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "ya29.a0");
        assert_eq!(response.refresh_token, Some("1//0g".to_string()));
        assert_eq!(response.expires_in, Some(3599));
    }

    #[test]
    fn test_granted_scopes_fallback() {
        let requested = vec!["a".to_string()];
        assert_eq!(granted_scopes(Some("x y"), &requested), vec!["x", "y"]);
        assert_eq!(granted_scopes(Some(" "), &requested), vec!["a"]);
        assert_eq!(granted_scopes(None, &requested), vec!["a"]);
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://127.0.0.1:5001/callback".into()),
                Matcher::UrlEncoded("client_id".into(), "client".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.new", "refresh_token": "1//r", "expires_in": 3600, "token_type": "Bearer"}"#)
            .create_async()
            .await;

        let token_uri = format!("{}/token", server.url());
        let creds = exchange_code(
            &reqwest::Client::new(),
            &client(token_uri.clone()),
            "auth-code",
            "http://127.0.0.1:5001/callback",
        )
        .await
        .unwrap();

        assert_eq!(creds.token, "ya29.new");
        assert_eq!(creds.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(creds.token_uri, token_uri);
        assert_eq!(creds.client_id, "client");
        assert_eq!(
            creds.scopes,
            vec!["https://www.googleapis.com/auth/youtube.force-ssl"]
        );
        assert!(creds.expiry.unwrap() > Utc::now());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_invalid_grant() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "invalid_grant", "error_description": "Bad Request"}"#)
            .create_async()
            .await;

        let err = exchange_code(
            &reqwest::Client::new(),
            &client(format!("{}/token", server.url())),
            "expired-code",
            "http://127.0.0.1:5001/callback",
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("invalid_grant - Bad Request"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "my_refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh", "expires_in": 3600}"#)
            .create_async()
            .await;

        let old = Credentials {
            token: "stale".to_string(),
            refresh_token: Some("my_refresh".to_string()),
            token_uri: format!("{}/token", server.url()),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec!["s".to_string()],
            expiry: Some(Utc::now() - Duration::seconds(10)),
        };

        let refreshed = refresh_credentials(&reqwest::Client::new(), &old).await.unwrap();
        assert_eq!(refreshed.token, "fresh");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("my_refresh"));
        assert_eq!(refreshed.scopes, vec!["s"]);
        assert!(!refreshed.is_expired());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let creds = Credentials {
            token: "t".to_string(),
            refresh_token: None,
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            scopes: vec![],
            expiry: None,
        };

        assert!(refresh_credentials(&reqwest::Client::new(), &creds).await.is_err());
    }
}
