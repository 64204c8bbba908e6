//! Webhook error types for Stripe webhook handling.
//!
//! The webhook endpoint acknowledges with 200 or rejects with 400; Stripe
//! redelivers anything non-2xx. A retryable failure surfaces as 400 with its
//! claim released so the redelivery re-runs the handler; a permanent failure
//! keeps the claim and the replay is absorbed by the dedup gate.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing from webhook event.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The customer referenced by the event is unknown to us.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// The price referenced by the event is unknown to us.
    #[error("Price not found: {0}")]
    PriceNotFound(String),

    /// No subscription row matches the provider subscription id.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Call back to the payment provider failed.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl WebhookError {
    /// Returns true if Stripe should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_)
                | WebhookError::Provider(_)
                // Eventual consistency: the row may exist on redelivery.
                | WebhookError::SubscriptionNotFound(_)
        )
    }

    /// Maps the error to the endpoint's response status.
    ///
    /// Ignored events are acknowledged so Stripe stops redelivering them;
    /// everything else rejects with 400.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Ignored(_) => StatusCode::OK,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_signature_displays_correctly() {
        assert_eq!(
            format!("{}", WebhookError::InvalidSignature),
            "Invalid signature"
        );
    }

    #[test]
    fn missing_metadata_displays_field_name() {
        let err = WebhookError::MissingMetadata("store_id");
        assert_eq!(format!("{}", err), "Missing metadata: store_id");
    }

    #[test]
    fn customer_not_found_displays_id() {
        let err = WebhookError::CustomerNotFound("cus_123".to_string());
        assert_eq!(format!("{}", err), "Customer not found: cus_123");
    }

    #[test]
    fn database_and_provider_errors_are_retryable() {
        assert!(WebhookError::Database("connection failed".to_string()).is_retryable());
        assert!(WebhookError::Provider("timeout".to_string()).is_retryable());
        assert!(WebhookError::SubscriptionNotFound("sub_1".to_string()).is_retryable());
    }

    #[test]
    fn signature_and_parse_errors_are_not_retryable() {
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::ParseError("bad json".to_string()).is_retryable());
        assert!(!WebhookError::Ignored("unhandled type".to_string()).is_retryable());
    }

    #[test]
    fn ignored_returns_ok() {
        assert_eq!(
            WebhookError::Ignored("not relevant".to_string()).status_code(),
            StatusCode::OK
        );
    }

    #[test]
    fn failures_return_bad_request() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::Database("down".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::CustomerNotFound("cus_x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
