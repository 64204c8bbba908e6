//! CustomerRepository port - store-to-provider-customer mapping.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, StoreId, Timestamp};

/// Mapping between a store and its payment provider customer.
#[derive(Debug, Clone)]
pub struct CustomerMapping {
    pub store_id: StoreId,
    /// Provider customer id (cus_xxx).
    pub provider_customer_id: String,
    pub email: String,
    pub created_at: Timestamp,
}

/// Port for persisting the store -> provider customer mapping.
///
/// One customer per store; `upsert` keeps the mapping current when a
/// customer is recreated at the provider.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Find the mapping for a store, if one exists.
    async fn find_by_store(
        &self,
        store_id: StoreId,
    ) -> Result<Option<CustomerMapping>, DomainError>;

    /// Find the store mapped to a provider customer id.
    async fn find_by_provider_customer(
        &self,
        provider_customer_id: &str,
    ) -> Result<Option<CustomerMapping>, DomainError>;

    /// Insert or replace the mapping for a store.
    async fn upsert(&self, mapping: CustomerMapping) -> Result<(), DomainError>;
}
