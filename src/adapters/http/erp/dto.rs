//! Request/response DTOs for the ERP endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /api/erp/tiny-token-exchange`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeRequest {
    #[serde(default)]
    pub store_id: Option<String>,
    /// OAuth authorization code from the Tiny consent redirect.
    #[serde(default)]
    pub code: Option<String>,
}

/// Confirmation that the integration is connected.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResponse {
    pub store_id: String,
    pub connected: bool,
    /// When the freshly issued access token expires (RFC 3339).
    pub expires_at: String,
}

/// Body of `POST /api/erp/tiny-api`.
///
/// GET proxy calls carry the same fields as query parameters instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TinyApiProxyRequest {
    #[serde(default)]
    pub store_id: Option<String>,
    /// Path under the Tiny API base URL, e.g. "/produtos".
    #[serde(default)]
    pub path: Option<String>,
    /// Query parameters forwarded verbatim.
    #[serde(default)]
    pub query: HashMap<String, String>,
    /// JSON body forwarded to Tiny.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}
