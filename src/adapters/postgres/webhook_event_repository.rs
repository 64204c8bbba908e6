//! PostgreSQL implementation of WebhookEventRepository.
//!
//! The claim is an insert-only gate: `ON CONFLICT (event_id) DO NOTHING`
//! with the primary key doing the dedup, so concurrent deliveries of the
//! same event see exactly one successful claim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::ports::{ClaimResult, WebhookEventRecord, WebhookEventRepository};

/// PostgreSQL implementation of the WebhookEventRepository port.
pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn claim(&self, event_id: &str, event_type: &str) -> Result<ClaimResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type, received_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(ClaimResult::AlreadyExists)
        } else {
            Ok(ClaimResult::Claimed)
        }
    }

    async fn record_outcome(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET processed_at = $2,
                result = $3,
                error_message = $4,
                payload = $5
            WHERE event_id = $1
            "#,
        )
        .bind(&record.event_id)
        .bind(record.processed_at)
        .bind(&record.result)
        .bind(&record.error_message)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to record webhook outcome: {}", e))
        })?;

        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<(), DomainError> {
        // Only unresolved claims are released; a recorded outcome keeps
        // the row so duplicates stay absorbed.
        sqlx::query("DELETE FROM webhook_events WHERE event_id = $1 AND result IS NULL")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to release webhook claim: {}", e))
            })?;

        Ok(())
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE received_at < $1")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to delete webhook events: {}", e))
            })?;

        Ok(result.rows_affected())
    }
}
