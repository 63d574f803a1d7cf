//! OAuth 2.0 client for the Bitrix24 authorization server
//!
//! Handles the authorization-code flow pieces that talk to the provider:
//! - Authorization URL building
//! - Authorization code exchange
//! - Token refresh
//!
//! Token endpoint calls are `GET` requests carrying the grant as query
//! parameters, which is what the provider expects.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::traits::TokenEndpoint;
use super::types::{OAuthError, TokenResponse};
use crate::config::Credentials;
use crate::error::{B24Error, Result};

/// OAuth 2.0 client bound to one credential store
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: Arc<Credentials>,
    client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client sharing the given HTTP client
    #[must_use]
    pub fn new(credentials: Arc<Credentials>, client: Client) -> Self {
        Self { credentials, client }
    }

    /// Generate the authorization URL the end user's browser is sent to
    ///
    /// `tokenHost + authorizePath` with `scope`, `response_type=code` and
    /// `client_id` query parameters.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        let params = [
            ("scope", self.credentials.scope()),
            ("response_type", "code"),
            ("client_id", self.credentials.client_id()),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.credentials.authorize_url(), query_string)
    }

    /// Exchange authorization code for tokens
    ///
    /// # Errors
    /// Returns error if:
    /// - The provider rejects the code
    /// - The request fails
    /// - Response parsing fails
    pub async fn exchange_code_for_tokens(&self, code: &str) -> Result<TokenResponse> {
        if code.trim().is_empty() {
            return Err(B24Error::Authorization(OAuthError {
                error: "invalid_request".to_string(),
                error_description: Some("authorization code is empty".to_string()),
            }));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.credentials.client_id()),
            ("client_secret", self.credentials.client_secret()),
            ("code", code),
        ];

        self.request_token(&params).await
    }

    /// Refresh access token using refresh token
    ///
    /// # Errors
    /// Returns error if:
    /// - No refresh token provided
    /// - Refresh fails
    /// - Token is invalid/revoked
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        if refresh_token.is_empty() {
            return Err(B24Error::NoRefreshToken);
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id()),
            ("client_secret", self.credentials.client_secret()),
            ("refresh_token", refresh_token),
        ];

        self.request_token(&params).await
    }

    /// Get a reference to the credential store
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = self.credentials.token_url();
        let grant_type = params.first().map_or("", |(_, v)| *v);
        debug!(%url, grant_type, "requesting token");

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(%status, grant_type, "token endpoint responded");

        // The provider reports grant errors as JSON, sometimes with 200
        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        if let Some(error) = parsed
            .as_ref()
            .filter(|v| v.get("error").is_some())
            .and_then(|v| serde_json::from_value::<OAuthError>(v.clone()).ok())
        {
            return Err(B24Error::Authorization(error));
        }

        if !status.is_success() {
            return Err(B24Error::Status {
                status: status.as_u16(),
                body: parsed.unwrap_or(Value::String(body)),
            });
        }

        serde_json::from_str(&body).map_err(|e| B24Error::Parse(e.to_string()))
    }
}

#[async_trait]
impl TokenEndpoint for OAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.exchange_code_for_tokens(code).await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.refresh_access_token(refresh_token).await
    }
}
