//! PostgreSQL implementation of ErpCredentialRepository.
//!
//! Tokens are stored as opaque text columns; `SecretString` wrapping happens
//! at the row boundary so tokens never appear in Debug output above this
//! layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::erp::TinyCredential;
use crate::domain::foundation::{DomainError, StoreId, Timestamp};
use crate::ports::ErpCredentialRepository;

/// PostgreSQL implementation of the ErpCredentialRepository port.
pub struct PostgresErpCredentialRepository {
    pool: PgPool,
}

impl PostgresErpCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    store_id: Uuid,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<CredentialRow> for TinyCredential {
    fn from(row: CredentialRow) -> Self {
        TinyCredential::new(
            StoreId::from_uuid(row.store_id),
            row.access_token,
            row.refresh_token,
            Timestamp::from_datetime(row.expires_at),
        )
    }
}

#[async_trait]
impl ErpCredentialRepository for PostgresErpCredentialRepository {
    async fn find_by_store(
        &self,
        store_id: StoreId,
    ) -> Result<Option<TinyCredential>, DomainError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r#"
            SELECT store_id, access_token, refresh_token, expires_at
            FROM erp_credentials
            WHERE store_id = $1
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find credential: {}", e)))?;

        Ok(row.map(TinyCredential::from))
    }

    async fn upsert(&self, credential: TinyCredential) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO erp_credentials (
                store_id, access_token, refresh_token, expires_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (store_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(credential.store_id.as_uuid())
        .bind(credential.access_token.expose_secret())
        .bind(credential.refresh_token.expose_secret())
        .bind(credential.expires_at.as_datetime())
        .bind(credential.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert credential: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, store_id: StoreId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM erp_credentials WHERE store_id = $1")
            .bind(store_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to delete credential: {}", e)))?;

        Ok(())
    }
}
