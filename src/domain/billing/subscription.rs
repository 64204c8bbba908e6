//! Store subscription entity.
//!
//! One row per provider subscription, keyed on the provider subscription id
//! so webhook replays and update races converge on a single record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StoreId, Timestamp};

/// Lifecycle status of a subscription, mirroring Stripe's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    Unknown,
}

impl SubscriptionStatus {
    /// Parse from the provider's status string. Unrecognized values map to
    /// `Unknown` rather than failing the webhook.
    pub fn from_provider(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }

    /// Provider-compatible string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this status grants the store access to paid features.
    ///
    /// `PastDue` keeps access during the dunning window.
    pub fn has_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue)
    }
}

/// A store's subscription as reconciled from webhook events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSubscription {
    /// Provider subscription id (sub_xxx). Primary key.
    pub provider_subscription_id: String,

    /// The store this subscription pays for.
    pub store_id: StoreId,

    /// Provider customer id (cus_xxx).
    pub provider_customer_id: String,

    /// Price the subscription is billed at.
    pub price_id: String,

    pub status: SubscriptionStatus,

    /// End of the current billing period, when known.
    pub current_period_end: Option<Timestamp>,

    /// Whether the subscription cancels at the end of the current period.
    pub cancel_at_period_end: bool,

    /// Set when the subscription is terminated.
    pub ended_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoreSubscription {
    /// Creates a new subscription record from provider data.
    pub fn new(
        provider_subscription_id: impl Into<String>,
        store_id: StoreId,
        provider_customer_id: impl Into<String>,
        price_id: impl Into<String>,
        status: SubscriptionStatus,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            provider_subscription_id: provider_subscription_id.into(),
            store_id,
            provider_customer_id: provider_customer_id.into(),
            price_id: price_id.into(),
            status,
            current_period_end: None,
            cancel_at_period_end: false,
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the subscription currently grants access.
    pub fn grants_access(&self) -> bool {
        self.ended_at.is_none() && self.status.has_access()
    }

    /// Marks the subscription as canceled, effective now.
    pub fn cancel(&mut self) {
        self.status = SubscriptionStatus::Canceled;
        self.ended_at = Some(Timestamp::now());
        self.updated_at = Timestamp::now();
    }
}
