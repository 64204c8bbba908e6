//! Tiny ERP HTTP client.
//!
//! Implements the `ErpGateway` port against Tiny's OAuth token endpoint and
//! public REST API. Token exchanges are form-encoded per OAuth 2.0; proxied
//! API calls carry the store's bearer token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::config::ErpConfig;
use crate::ports::{ErpApiRequest, ErpApiResponse, ErpError, ErpGateway, ErpMethod, TokenGrant};

/// Tiny ERP gateway over HTTP.
pub struct TinyErpClient {
    config: ErpConfig,
    http_client: reqwest::Client,
}

impl TinyErpClient {
    pub fn new(config: ErpConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, ErpError> {
        let response = self
            .http_client
            .post(&self.config.tiny_token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ErpError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ErpError::Network(e.to_string()))?;

        if status.is_success() {
            let grant: TokenResponse = serde_json::from_str(&body)
                .map_err(|e| ErpError::InvalidResponse(format!("token payload: {}", e)))?;
            return Ok(TokenGrant {
                access_token: SecretString::new(grant.access_token),
                refresh_token: SecretString::new(grant.refresh_token),
                expires_in: grant.expires_in,
            });
        }

        let rejection: Option<TokenErrorResponse> = serde_json::from_str(&body).ok();
        match status.as_u16() {
            400 | 401 => {
                let detail = rejection
                    .as_ref()
                    .map(|r| r.error.clone())
                    .unwrap_or_else(|| format!("HTTP {}", status));
                // Keycloak reports a dead refresh token as invalid_grant.
                if rejection.map(|r| r.error) == Some("invalid_grant".to_string()) {
                    warn!("Tiny refresh token rejected; reconnection required");
                    Err(ErpError::RefreshTokenExpired)
                } else {
                    Err(ErpError::AuthorizationRejected(detail))
                }
            }
            500..=599 => {
                error!(%status, "Tiny token endpoint unavailable");
                Err(ErpError::Unavailable(format!("HTTP {}", status)))
            }
            _ => Err(ErpError::InvalidResponse(format!(
                "unexpected token status {}",
                status
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

#[async_trait]
impl ErpGateway for TinyErpClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ErpError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.config.tiny_client_id),
            ("client_secret", &self.config.tiny_client_secret),
            ("redirect_uri", &self.config.tiny_redirect_uri),
            ("code", code),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenGrant, ErpError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.config.tiny_client_id),
            ("client_secret", &self.config.tiny_client_secret),
            ("refresh_token", refresh_token.expose_secret()),
        ])
        .await
    }

    async fn call(
        &self,
        request: ErpApiRequest,
        bearer_token: &SecretString,
    ) -> Result<ErpApiResponse, ErpError> {
        let url = format!("{}{}", self.config.tiny_api_base_url, request.path);

        let mut builder = match request.method {
            ErpMethod::Get => self.http_client.get(&url),
            ErpMethod::Post => self.http_client.post(&url),
        };
        builder = builder
            .bearer_auth(bearer_token.expose_secret())
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ErpError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ErpError::Network(e.to_string()))?;

        // Tiny returns empty bodies on some successful POSTs.
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ErpError::InvalidResponse(format!("API payload: {}", e)))?
        };

        Ok(ErpApiResponse { status, body })
    }
}
