//! WebhookEventRepository port - dedup gate and audit trail for Stripe webhooks.
//!
//! Stripe may deliver the same event multiple times (timeouts, non-2xx
//! responses, lost acknowledgements). Processing claims the event id with an
//! insert-only gate BEFORE dispatching, so two concurrent deliveries of the
//! same event can never both run a handler; the full payload and outcome are
//! recorded afterwards for auditing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Outcome record for a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,

    /// Type of Stripe event (e.g., "checkout.session.completed").
    pub event_type: String,

    /// When the event was processed.
    pub processed_at: DateTime<Utc>,

    /// Result of processing: "success", "ignored", or "failed".
    pub result: String,

    /// Error message or ignore reason, if any.
    pub error_message: Option<String>,

    /// Original event payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    /// Creates a new success record.
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            result: "success".to_string(),
            error_message: None,
            payload,
        }
    }

    /// Creates a new ignored record.
    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            result: "ignored".to_string(),
            error_message: Some(reason.into()),
            payload,
        }
    }

    /// Creates a new failure record.
    pub fn failed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            result: "failed".to_string(),
            error_message: Some(error.into()),
            payload,
        }
    }
}

/// Result of attempting to claim a webhook event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// Event id was claimed (first time seeing this event).
    Claimed,
    /// Event id already exists (duplicate delivery).
    AlreadyExists,
}

/// Port for the webhook dedup gate and audit trail.
///
/// Implementations must make `claim` atomic (PRIMARY KEY on event_id with
/// `ON CONFLICT DO NOTHING`) so concurrent deliveries race safely.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Claim an event id before dispatching its handler.
    async fn claim(&self, event_id: &str, event_type: &str) -> Result<ClaimResult, DomainError>;

    /// Record the processing outcome for a previously claimed event.
    async fn record_outcome(&self, record: WebhookEventRecord) -> Result<(), DomainError>;

    /// Drop an unresolved claim so a provider redelivery can run the
    /// handler again. Claims that already have an outcome are left alone.
    async fn release(&self, event_id: &str) -> Result<(), DomainError>;

    /// Delete records older than the specified timestamp.
    ///
    /// Returns the number of records deleted. Used for retention cleanup.
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError>;
}

#[async_trait]
impl WebhookEventRepository for std::sync::Arc<dyn WebhookEventRepository> {
    async fn claim(&self, event_id: &str, event_type: &str) -> Result<ClaimResult, DomainError> {
        (**self).claim(event_id, event_type).await
    }

    async fn record_outcome(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        (**self).record_outcome(record).await
    }

    async fn release(&self, event_id: &str) -> Result<(), DomainError> {
        (**self).release(event_id).await
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        (**self).delete_before(timestamp).await
    }
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Event was processed successfully.
    Processed,
    /// Event type is not one we handle; acknowledged without side effects.
    Ignored,
    /// Event was already processed (idempotent skip).
    AlreadyProcessed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_record_has_correct_fields() {
        let record = WebhookEventRecord::success(
            "evt_123",
            "checkout.session.completed",
            serde_json::json!({"id": "test"}),
        );

        assert_eq!(record.event_id, "evt_123");
        assert_eq!(record.result, "success");
        assert!(record.error_message.is_none());
    }

    #[test]
    fn ignored_record_includes_reason() {
        let record = WebhookEventRecord::ignored(
            "evt_456",
            "invoice.paid",
            "unhandled event type",
            serde_json::json!({}),
        );

        assert_eq!(record.result, "ignored");
        assert_eq!(
            record.error_message,
            Some("unhandled event type".to_string())
        );
    }

    #[test]
    fn failed_record_includes_error() {
        let record = WebhookEventRecord::failed(
            "evt_789",
            "customer.subscription.updated",
            "Subscription not found: sub_x",
            serde_json::json!({}),
        );

        assert_eq!(record.result, "failed");
        assert!(record.error_message.is_some());
    }
}
