//! Request/response DTOs for the billing endpoints.
//!
//! Fields arrive optional and are validated by hand so missing fields answer
//! with the standard error envelope instead of a bare deserialization 422.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/billing/create-checkout-session`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest {
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
}

/// Body of `POST /api/billing/create-portal-session`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortalSessionRequest {
    #[serde(default)]
    pub store_id: Option<String>,
}

/// Success body for a newly created checkout session.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    /// Provider session id (cs_xxx).
    pub id: String,
    pub url: String,
    pub success: bool,
}

/// Redirect body when the caller is sent to the billing portal instead.
#[derive(Debug, Serialize, Deserialize)]
pub struct PortalSessionResponse {
    pub url: String,
}

/// Acknowledgement body for the Stripe webhook endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    /// "processed", "ignored", or "already_processed".
    pub outcome: String,
}
