//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Rows are keyed on the provider subscription id so webhook replays and
//! out-of-order updates converge on one record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{StoreSubscription, SubscriptionStatus};
use crate::domain::foundation::{DomainError, StoreId, Timestamp};
use crate::ports::SubscriptionRepository;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    provider_subscription_id: String,
    store_id: Uuid,
    provider_customer_id: String,
    price_id: String,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    ended_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for StoreSubscription {
    fn from(row: SubscriptionRow) -> Self {
        StoreSubscription {
            provider_subscription_id: row.provider_subscription_id,
            store_id: StoreId::from_uuid(row.store_id),
            provider_customer_id: row.provider_customer_id,
            price_id: row.price_id,
            status: SubscriptionStatus::from_provider(&row.status),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            ended_at: row.ended_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT provider_subscription_id, store_id, provider_customer_id, price_id,
           status, current_period_end, cancel_at_period_end, ended_at,
           created_at, updated_at
    FROM store_subscriptions
"#;

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<StoreSubscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE provider_subscription_id = $1"))
                .bind(provider_subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to find subscription: {}", e))
                })?;

        Ok(row.map(StoreSubscription::from))
    }

    async fn find_active_by_store(
        &self,
        store_id: StoreId,
    ) -> Result<Option<StoreSubscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"{SELECT_COLUMNS}
            WHERE store_id = $1
              AND ended_at IS NULL
              AND status IN ('active', 'trialing', 'past_due')
            ORDER BY updated_at DESC
            LIMIT 1
            "#
        ))
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find subscription: {}", e)))?;

        Ok(row.map(StoreSubscription::from))
    }

    async fn upsert(&self, subscription: StoreSubscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO store_subscriptions (
                provider_subscription_id, store_id, provider_customer_id, price_id,
                status, current_period_end, cancel_at_period_end, ended_at,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider_subscription_id) DO UPDATE
            SET status = EXCLUDED.status,
                price_id = EXCLUDED.price_id,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                ended_at = EXCLUDED.ended_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&subscription.provider_subscription_id)
        .bind(subscription.store_id.as_uuid())
        .bind(&subscription.provider_customer_id)
        .bind(&subscription.price_id)
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.ended_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert subscription: {}", e)))?;

        Ok(())
    }

    async fn update(&self, subscription: StoreSubscription) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE store_subscriptions
            SET status = $2,
                current_period_end = $3,
                cancel_at_period_end = $4,
                ended_at = $5,
                updated_at = $6
            WHERE provider_subscription_id = $1
            "#,
        )
        .bind(&subscription.provider_subscription_id)
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.ended_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update subscription: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
