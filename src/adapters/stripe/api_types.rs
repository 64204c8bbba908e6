//! Stripe API response wire types.
//!
//! Only the fields the adapter reads are captured; Stripe's full schemas
//! carry far more.

use std::collections::HashMap;

use serde::Deserialize;

/// Customer object from `/v1/customers`.
#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    /// Stripe returns `"deleted": true` stubs for removed customers.
    #[serde(default)]
    pub deleted: bool,
}

/// Price object from `/v1/prices`.
#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub active: bool,
    pub currency: String,
    pub unit_amount: Option<i64>,
}

/// Subscription object from `/v1/subscriptions`.
#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: StripePrice,
}

/// Checkout session object from `/v1/checkout/sessions`.
#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    /// Hosted checkout URL; absent once the session is consumed.
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Billing portal session object from `/v1/billing_portal/sessions`.
#[derive(Debug, Deserialize)]
pub struct StripePortalSession {
    pub id: String,
    pub url: String,
}

/// Error envelope Stripe wraps around non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeApiError,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_customer_stub_parses() {
        let json = r#"{"id": "cus_1", "deleted": true}"#;
        let customer: StripeCustomer = serde_json::from_str(json).unwrap();
        assert!(customer.deleted);
        assert!(customer.email.is_none());
    }

    #[test]
    fn subscription_with_items_parses() {
        let json = r#"{
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_end": 1735689600,
            "cancel_at_period_end": false,
            "items": {"data": [{"price": {"id": "price_1", "active": true, "currency": "brl", "unit_amount": 9900}}]}
        }"#;
        let sub: StripeSubscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.items.data[0].price.id, "price_1");
    }

    #[test]
    fn error_envelope_parses() {
        let json = r#"{"error": {"code": "resource_missing", "message": "No such price", "type": "invalid_request_error"}}"#;
        let envelope: StripeErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.error.code.as_deref(), Some("resource_missing"));
    }
}
