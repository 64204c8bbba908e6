//! BillingEventDispatcher - routes verified Stripe events to their handlers.
//!
//! Three event types drive subscription reconciliation:
//!
//! - `checkout.session.completed` creates (or replays onto) the subscription
//!   row and flips the store's status.
//! - `customer.subscription.updated` reconciles status changes.
//! - `customer.subscription.deleted` terminates the subscription.
//!
//! Everything else is acknowledged and ignored. Handlers fail loudly on
//! unknown customers and prices; silently skipping those would leave a paid
//! store without access.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::billing::{
    StoreSubscription, StripeEvent, StripeEventType, SubscriptionStatus, WebhookError,
    WebhookDispatcher,
};
use crate::domain::foundation::{StoreId, Timestamp};
use crate::ports::{
    CustomerRepository, PaymentProvider, StoreRepository, SubscriptionRepository,
};

/// Checkout session object as delivered in `checkout.session.completed`.
#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Subscription object as delivered in `customer.subscription.*` events.
#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    current_period_end: Option<i64>,
}

/// Stripe sends period ends as Unix seconds; a negative value is malformed
/// and treated as absent.
fn period_end(secs: Option<i64>) -> Option<Timestamp> {
    secs.and_then(|s| u64::try_from(s).ok())
        .map(Timestamp::from_unix_secs)
}

/// Dispatcher wiring Stripe events to subscription reconciliation.
pub struct BillingEventDispatcher {
    stores: Arc<dyn StoreRepository>,
    customers: Arc<dyn CustomerRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl BillingEventDispatcher {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        customers: Arc<dyn CustomerRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            stores,
            customers,
            subscriptions,
            payment_provider,
        }
    }

    /// `checkout.session.completed`: the payment went through; mirror the
    /// provider subscription locally and grant the store access.
    async fn handle_checkout_completed(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let store_id = session
            .metadata
            .get("storeId")
            .ok_or(WebhookError::MissingMetadata("storeId"))?
            .parse::<StoreId>()
            .map_err(|_| WebhookError::MissingMetadata("storeId"))?;
        let customer_id = session
            .customer
            .as_deref()
            .ok_or(WebhookError::MissingField("customer"))?;
        let subscription_id = session
            .subscription
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription"))?;

        // The mapping must exist; checkout created it before redirecting.
        self.customers
            .find_by_store(store_id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or_else(|| WebhookError::CustomerNotFound(customer_id.to_string()))?;

        // Pull the authoritative subscription state from the provider.
        let provider_sub = self
            .payment_provider
            .get_subscription(subscription_id)
            .await
            .map_err(|e| WebhookError::Provider(e.to_string()))?;

        // The price must be one we know how to sell.
        self.payment_provider
            .get_price(&provider_sub.price_id)
            .await
            .map_err(|e| WebhookError::Provider(e.to_string()))?
            .ok_or_else(|| WebhookError::PriceNotFound(provider_sub.price_id.clone()))?;

        let mut subscription = StoreSubscription::new(
            &provider_sub.id,
            store_id,
            customer_id,
            &provider_sub.price_id,
            provider_sub.status,
        );
        subscription.cancel_at_period_end = provider_sub.cancel_at_period_end;
        subscription.current_period_end = period_end(provider_sub.current_period_end);

        self.subscriptions
            .upsert(subscription)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        self.stores
            .update_subscription_status(store_id, provider_sub.status)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        info!(
            session_id = %session.id,
            %store_id,
            subscription_id = %provider_sub.id,
            status = provider_sub.status.as_str(),
            "checkout completed, subscription recorded"
        );
        Ok(())
    }

    /// `customer.subscription.updated`: reconcile mutable fields.
    async fn handle_subscription_updated(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let object: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let mut subscription = self
            .subscriptions
            .find_by_provider_id(&object.id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or_else(|| WebhookError::SubscriptionNotFound(object.id.clone()))?;

        subscription.status = SubscriptionStatus::from_provider(&object.status);
        subscription.cancel_at_period_end = object.cancel_at_period_end;
        subscription.current_period_end = period_end(object.current_period_end);
        subscription.updated_at = Timestamp::now();

        let store_id = subscription.store_id;
        let status = subscription.status;
        self.subscriptions
            .update(subscription)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        self.stores
            .update_subscription_status(store_id, status)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        info!(
            subscription_id = %object.id,
            %store_id,
            status = status.as_str(),
            "subscription updated"
        );
        Ok(())
    }

    /// `customer.subscription.deleted`: terminate, effective now.
    async fn handle_subscription_deleted(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let object: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let mut subscription = self
            .subscriptions
            .find_by_provider_id(&object.id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?
            .ok_or_else(|| WebhookError::SubscriptionNotFound(object.id.clone()))?;

        subscription.cancel();
        let store_id = subscription.store_id;
        self.subscriptions
            .update(subscription)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        self.stores
            .update_subscription_status(store_id, SubscriptionStatus::Canceled)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        info!(subscription_id = %object.id, %store_id, "subscription canceled");
        Ok(())
    }
}

#[async_trait]
impl WebhookDispatcher for BillingEventDispatcher {
    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => {
                self.handle_checkout_completed(event).await
            }
            StripeEventType::CustomerSubscriptionUpdated => {
                self.handle_subscription_updated(event).await
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                self.handle_subscription_deleted(event).await
            }
            StripeEventType::Unknown => {
                warn!(event_type = %event.event_type, "unhandled webhook event type");
                Err(WebhookError::Ignored(event.event_type.clone()))
            }
        }
    }
}
