//! Tiny ERP integration configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Tiny ERP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ErpConfig {
    /// OAuth client ID registered with Tiny
    pub tiny_client_id: String,

    /// OAuth client secret
    pub tiny_client_secret: String,

    /// Base URL for the Tiny REST API
    #[serde(default = "default_api_base_url")]
    pub tiny_api_base_url: String,

    /// Token endpoint for OAuth code/refresh exchanges
    #[serde(default = "default_token_url")]
    pub tiny_token_url: String,

    /// Redirect URI used during the OAuth code exchange
    pub tiny_redirect_uri: String,

    /// Requests allowed per rate limit window for token exchanges
    #[serde(default = "default_token_exchange_limit")]
    pub token_exchange_limit: u32,

    /// Rate limit window in seconds
    #[serde(default = "default_token_exchange_window")]
    pub token_exchange_window_secs: u32,
}

impl ErpConfig {
    /// Validate ERP configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tiny_client_id.is_empty() {
            return Err(ValidationError::MissingRequired("TINY_CLIENT_ID"));
        }
        if self.tiny_client_secret.is_empty() {
            return Err(ValidationError::MissingRequired("TINY_CLIENT_SECRET"));
        }
        if self.tiny_redirect_uri.is_empty() {
            return Err(ValidationError::MissingRequired("TINY_REDIRECT_URI"));
        }
        if !self.tiny_api_base_url.starts_with("https://")
            && !self.tiny_api_base_url.starts_with("http://")
        {
            return Err(ValidationError::InvalidErpBaseUrl);
        }
        if self.token_exchange_window_secs == 0 {
            return Err(ValidationError::InvalidRateLimitWindow);
        }
        Ok(())
    }
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            tiny_client_id: String::new(),
            tiny_client_secret: String::new(),
            tiny_api_base_url: default_api_base_url(),
            tiny_token_url: default_token_url(),
            tiny_redirect_uri: String::new(),
            token_exchange_limit: default_token_exchange_limit(),
            token_exchange_window_secs: default_token_exchange_window(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.tiny.com.br/public-api/v3".to_string()
}

fn default_token_url() -> String {
    "https://accounts.tiny.com.br/realms/tiny/protocol/openid-connect/token".to_string()
}

fn default_token_exchange_limit() -> u32 {
    100
}

fn default_token_exchange_window() -> u32 {
    900
}
