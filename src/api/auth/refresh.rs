use super::token::{Credential, TokenProvider};
use crate::api::drive::client::build_client;
use crate::error::UploadError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// 用 refresh token 换取新的 access token，不需要人工参与。
/// 换到的 token 不缓存也不落盘，每次运行重新换取。
pub struct RefreshTokenProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    refresh_token: String,
}

impl RefreshTokenProvider {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        refresh_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        Ok(RefreshTokenProvider {
            http: build_client(timeout)?,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            refresh_token: refresh_token.into(),
        })
    }

    async fn exchange_refresh_token(&self) -> Result<Credential, UploadError> {
        let mut params = vec![
            ("client_id", self.client_id.clone()),
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", self.refresh_token.clone()),
        ];
        if let Some(secret) = self
            .client_secret
            .as_ref()
            .filter(|value| !value.trim().is_empty())
        {
            params.push(("client_secret", secret.clone()));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| UploadError::AuthDenied(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UploadError::AuthDenied(format!(
                "token endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::AuthDenied(format!("failed to read token response: {e}")))?;
        let payload: TokenResponse = serde_json::from_slice(&body).map_err(|source| {
            UploadError::Schema {
                context: "token refresh",
                source,
            }
        })?;

        if let Some(error) = payload.error {
            let description = payload.error_description.unwrap_or_default();
            return Err(UploadError::AuthDenied(format!("{error}: {description}")));
        }

        let access_token = payload
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| UploadError::AuthDenied("missing access_token in response".into()))?;

        Ok(Credential::new(access_token))
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn get_token(&self, interactive: bool) -> Result<Credential, UploadError> {
        debug!(interactive, "exchanging refresh token");
        self.exchange_refresh_token().await.inspect_err(|err| {
            warn!(error = %err, "refresh token exchange failed");
        })
    }
}
