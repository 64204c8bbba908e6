//! ErpGateway port - Tiny ERP OAuth flow and API proxying.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;

/// Tokens returned by the ERP OAuth token endpoint.
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenGrant {
    // Tokens never appear in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// HTTP method for a proxied ERP API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErpMethod {
    Get,
    Post,
}

/// A proxied call against the ERP API.
#[derive(Debug, Clone)]
pub struct ErpApiRequest {
    pub method: ErpMethod,
    /// Path under the ERP API base URL, e.g. "/produtos".
    pub path: String,
    /// Query string parameters forwarded verbatim.
    pub query: Vec<(String, String)>,
    /// JSON body for POST calls.
    pub body: Option<Value>,
}

/// Response from a proxied ERP API call.
#[derive(Debug, Clone)]
pub struct ErpApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Errors from the ERP gateway.
#[derive(Debug, thiserror::Error)]
pub enum ErpError {
    /// The authorization code or refresh token was rejected.
    #[error("ERP authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// The refresh token is no longer valid; reconnection is required.
    #[error("ERP refresh token expired")]
    RefreshTokenExpired,

    /// Network failure reaching the ERP.
    #[error("ERP network error: {0}")]
    Network(String),

    /// The ERP returned an unexpected payload.
    #[error("ERP invalid response: {0}")]
    InvalidResponse(String),

    /// ERP-side failure (5xx).
    #[error("ERP unavailable: {0}")]
    Unavailable(String),
}

impl ErpError {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErpError::Network(_) | ErpError::Unavailable(_))
    }
}

/// Port for Tiny ERP OAuth and API operations.
#[async_trait]
pub trait ErpGateway: Send + Sync {
    /// Exchange an OAuth authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ErpError>;

    /// Refresh an access token using a refresh token.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenGrant, ErpError>;

    /// Execute a proxied API call with the given bearer token.
    async fn call(
        &self,
        request: ErpApiRequest,
        bearer_token: &SecretString,
    ) -> Result<ErpApiResponse, ErpError>;
}
