//! StoreRepository port - tenant store lookup and subscription state.

use async_trait::async_trait;

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::{DomainError, StoreId, Timestamp, UserId};

/// A merchant store as seen by the billing subsystem.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: StoreId,
    pub owner_user_id: UserId,
    pub name: String,
    /// Denormalized subscription status for fast access checks.
    pub subscription_status: Option<SubscriptionStatus>,
    pub created_at: Timestamp,
}

impl Store {
    /// Whether the given user owns this store.
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.owner_user_id == user_id
    }
}

/// Port for store lookup and subscription state updates.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Find a store by id. Returns `None` when it does not exist.
    async fn find_by_id(&self, store_id: StoreId) -> Result<Option<Store>, DomainError>;

    /// Update the denormalized subscription status on the store row.
    async fn update_subscription_status(
        &self,
        store_id: StoreId,
        status: SubscriptionStatus,
    ) -> Result<(), DomainError>;
}
