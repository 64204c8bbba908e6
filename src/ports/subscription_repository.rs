//! SubscriptionRepository port - persisted subscription state.

use async_trait::async_trait;

use crate::domain::billing::StoreSubscription;
use crate::domain::foundation::{DomainError, StoreId};

/// Port for persisting subscriptions mirrored from the payment provider.
///
/// All writes are keyed on the provider subscription id so that webhook
/// redeliveries and out-of-order events converge on the same row.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by provider subscription id.
    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<StoreSubscription>, DomainError>;

    /// Find the most recent access-granting subscription for a store.
    async fn find_active_by_store(
        &self,
        store_id: StoreId,
    ) -> Result<Option<StoreSubscription>, DomainError>;

    /// Insert or replace a subscription, keyed on provider subscription id.
    async fn upsert(&self, subscription: StoreSubscription) -> Result<(), DomainError>;

    /// Update mutable fields on an existing subscription.
    ///
    /// Returns `false` when no row with that provider id exists.
    async fn update(&self, subscription: StoreSubscription) -> Result<bool, DomainError>;
}
