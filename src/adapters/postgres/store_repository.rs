//! PostgreSQL implementation of StoreRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::{DomainError, ErrorCode, StoreId, Timestamp, UserId};
use crate::ports::{Store, StoreRepository};

/// PostgreSQL implementation of the StoreRepository port.
pub struct PostgresStoreRepository {
    pool: PgPool,
}

impl PostgresStoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: Uuid,
    owner_user_id: String,
    name: String,
    subscription_status: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = DomainError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(Store {
            id: StoreId::from_uuid(row.id),
            owner_user_id: UserId::new(row.owner_user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid owner id: {}", e))
            })?,
            name: row.name,
            subscription_status: row
                .subscription_status
                .as_deref()
                .map(SubscriptionStatus::from_provider),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl StoreRepository for PostgresStoreRepository {
    async fn find_by_id(&self, store_id: StoreId) -> Result<Option<Store>, DomainError> {
        let row: Option<StoreRow> = sqlx::query_as(
            r#"
            SELECT id, owner_user_id, name, subscription_status, created_at
            FROM stores
            WHERE id = $1
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find store: {}", e)))?;

        row.map(Store::try_from).transpose()
    }

    async fn update_subscription_status(
        &self,
        store_id: StoreId,
        status: SubscriptionStatus,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE stores
            SET subscription_status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(store_id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update store status: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::StoreNotFound, "Store not found"));
        }
        Ok(())
    }
}
