//! Stripe webhook event types.
//!
//! Defines the structures for parsing Stripe webhook payloads.
//! Only fields relevant to our processing are captured.

use serde::{Deserialize, Serialize};

/// Stripe webhook event (simplified).
///
/// Contains the essential fields needed for webhook processing.
/// Additional fields from Stripe's full event schema are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }
}

/// Known Stripe event types that we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Customer subscription was updated.
    CustomerSubscriptionUpdated,
    /// Customer subscription was deleted.
    CustomerSubscriptionDeleted,
    /// Unknown or unhandled event type.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown => "unknown",
        }
    }
}

/// Builder for creating test StripeEvent instances.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    previous_attributes: Option<serde_json::Value>,
    livemode: bool,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            previous_attributes: None,
            livemode: false,
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: self.previous_attributes,
            },
            livemode: self.livemode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": {
                "object": {}
            },
            "livemode": false
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.created, 1704067200);
        assert!(!event.livemode);
    }

    #[test]
    fn deserialize_event_with_previous_attributes() {
        let json = r#"{
            "id": "evt_update_123",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {
                "object": {"status": "active"},
                "previous_attributes": {"status": "past_due"}
            },
            "livemode": true
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert!(event.data.previous_attributes.is_some());
        let prev = event.data.previous_attributes.unwrap();
        assert_eq!(prev["status"], "past_due");
    }

    #[test]
    fn deserialize_object_to_custom_type() {
        #[derive(Debug, serde::Deserialize)]
        struct CheckoutSession {
            id: String,
            customer: String,
        }

        let event = StripeEventBuilder::new()
            .object(json!({
                "id": "cs_test_abc123",
                "customer": "cus_xyz789"
            }))
            .build();

        let session: CheckoutSession = event.deserialize_object().unwrap();
        assert_eq!(session.id, "cs_test_abc123");
        assert_eq!(session.customer, "cus_xyz789");
    }

    #[test]
    fn event_type_from_str_known_types() {
        assert_eq!(
            StripeEventType::from_str("checkout.session.completed"),
            StripeEventType::CheckoutSessionCompleted
        );
        assert_eq!(
            StripeEventType::from_str("customer.subscription.updated"),
            StripeEventType::CustomerSubscriptionUpdated
        );
        assert_eq!(
            StripeEventType::from_str("customer.subscription.deleted"),
            StripeEventType::CustomerSubscriptionDeleted
        );
    }

    #[test]
    fn event_type_from_str_unknown() {
        assert_eq!(
            StripeEventType::from_str("invoice.payment_succeeded"),
            StripeEventType::Unknown
        );
    }

    #[test]
    fn event_type_as_str_roundtrip() {
        let types = [
            StripeEventType::CheckoutSessionCompleted,
            StripeEventType::CustomerSubscriptionUpdated,
            StripeEventType::CustomerSubscriptionDeleted,
        ];

        for event_type in types {
            assert_eq!(StripeEventType::from_str(event_type.as_str()), event_type);
        }
    }

    #[test]
    fn parsed_type_returns_correct_variant() {
        let event = StripeEventBuilder::new()
            .event_type("customer.subscription.deleted")
            .build();

        assert_eq!(
            event.parsed_type(),
            StripeEventType::CustomerSubscriptionDeleted
        );
    }
}
