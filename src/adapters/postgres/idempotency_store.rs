//! PostgreSQL implementation of IdempotencyStore.
//!
//! `begin` relies on the primary key plus `ON CONFLICT DO NOTHING`: of two
//! concurrent claims for the same key, exactly one inserts and the other
//! reads the winner's record back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::ports::{BeginOutcome, IdempotencyRecord, IdempotencyStore, OperationStatus};

/// PostgreSQL implementation of the IdempotencyStore port.
pub struct PostgresIdempotencyStore {
    pool: PgPool,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdempotencyRow {
    key: String,
    operation_name: String,
    status: String,
    result: Option<Value>,
    error: Option<String>,
    attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdempotencyRow> for IdempotencyRecord {
    type Error = DomainError;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "processing" => OperationStatus::Processing,
            "completed" => OperationStatus::Completed,
            "failed" => OperationStatus::Failed,
            other => {
                return Err(DomainError::database(format!(
                    "Unknown idempotency status: {}",
                    other
                )))
            }
        };

        Ok(IdempotencyRecord {
            key: row.key,
            operation_name: row.operation_name,
            status,
            result: row.result,
            error: row.error,
            attempts: row.attempts.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn begin(&self, key: &str, operation_name: &str) -> Result<BeginOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_records (
                key, operation_name, status, attempts, created_at, updated_at
            ) VALUES ($1, $2, 'processing', 0, NOW(), NOW())
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(operation_name)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to begin operation: {}", e)))?;

        if result.rows_affected() > 0 {
            return Ok(BeginOutcome::Started);
        }

        let row: Option<IdempotencyRow> = sqlx::query_as(
            r#"
            SELECT key, operation_name, status, result, error, attempts,
                   created_at, updated_at
            FROM idempotency_records
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load operation record: {}", e)))?;

        match row {
            Some(row) => Ok(BeginOutcome::Existing(IdempotencyRecord::try_from(row)?)),
            // The record was deleted between the insert and the read (stale
            // sweep); treat the key as claimed by re-inserting.
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO idempotency_records (
                        key, operation_name, status, attempts, created_at, updated_at
                    ) VALUES ($1, $2, 'processing', 0, NOW(), NOW())
                    ON CONFLICT (key) DO NOTHING
                    "#,
                )
                .bind(key)
                .bind(operation_name)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to begin operation: {}", e))
                })?;
                Ok(BeginOutcome::Started)
            }
        }
    }

    async fn update(&self, record: IdempotencyRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_records (
                key, operation_name, status, result, error, attempts,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (key) DO UPDATE
            SET status = EXCLUDED.status,
                result = EXCLUDED.result,
                error = EXCLUDED.error,
                attempts = EXCLUDED.attempts,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.key)
        .bind(&record.operation_name)
        .bind(record.status.as_str())
        .bind(&record.result)
        .bind(&record.error)
        .bind(record.attempts as i32)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update operation record: {}", e)))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM idempotency_records WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to remove operation record: {}", e))
            })?;

        Ok(())
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM idempotency_records WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to delete stale records: {}", e))
            })?;

        Ok(result.rows_affected())
    }
}
