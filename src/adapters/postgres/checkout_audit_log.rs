//! PostgreSQL implementation of CheckoutAuditLog.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::ports::{CheckoutAuditEntry, CheckoutAuditLog};

/// PostgreSQL implementation of the CheckoutAuditLog port.
pub struct PostgresCheckoutAuditLog {
    pool: PgPool,
}

impl PostgresCheckoutAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckoutAuditLog for PostgresCheckoutAuditLog {
    async fn append(&self, entry: CheckoutAuditEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO checkout_audit_log (
                request_id, store_id, price_id, session_id,
                session_kind, status, error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.request_id.as_uuid())
        .bind(entry.store_id.as_uuid())
        .bind(&entry.price_id)
        .bind(&entry.session_id)
        .bind(entry.kind.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(entry.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to append audit entry: {}", e)))?;

        Ok(())
    }
}
