//! ErpCredentialRepository port - per-store Tiny ERP OAuth credentials.

use async_trait::async_trait;

use crate::domain::erp::TinyCredential;
use crate::domain::foundation::{DomainError, StoreId};

/// Port for persisting per-store ERP OAuth credentials.
#[async_trait]
pub trait ErpCredentialRepository: Send + Sync {
    /// Find the stored credential for a store.
    async fn find_by_store(
        &self,
        store_id: StoreId,
    ) -> Result<Option<TinyCredential>, DomainError>;

    /// Insert or replace the credential for a store.
    async fn upsert(&self, credential: TinyCredential) -> Result<(), DomainError>;

    /// Remove the credential, e.g. after a revoked refresh token.
    async fn delete(&self, store_id: StoreId) -> Result<(), DomainError>;
}
