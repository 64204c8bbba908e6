//! PostgreSQL implementation of CustomerRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, StoreId, Timestamp};
use crate::ports::{CustomerMapping, CustomerRepository};

/// PostgreSQL implementation of the CustomerRepository port.
pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    store_id: Uuid,
    provider_customer_id: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for CustomerMapping {
    fn from(row: CustomerRow) -> Self {
        CustomerMapping {
            store_id: StoreId::from_uuid(row.store_id),
            provider_customer_id: row.provider_customer_id,
            email: row.email,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn find_by_store(
        &self,
        store_id: StoreId,
    ) -> Result<Option<CustomerMapping>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT store_id, provider_customer_id, email, created_at
            FROM billing_customers
            WHERE store_id = $1
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find customer: {}", e)))?;

        Ok(row.map(CustomerMapping::from))
    }

    async fn find_by_provider_customer(
        &self,
        provider_customer_id: &str,
    ) -> Result<Option<CustomerMapping>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT store_id, provider_customer_id, email, created_at
            FROM billing_customers
            WHERE provider_customer_id = $1
            "#,
        )
        .bind(provider_customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find customer: {}", e)))?;

        Ok(row.map(CustomerMapping::from))
    }

    async fn upsert(&self, mapping: CustomerMapping) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO billing_customers (store_id, provider_customer_id, email, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (store_id) DO UPDATE
            SET provider_customer_id = EXCLUDED.provider_customer_id,
                email = EXCLUDED.email
            "#,
        )
        .bind(mapping.store_id.as_uuid())
        .bind(&mapping.provider_customer_id)
        .bind(&mapping.email)
        .bind(mapping.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert customer: {}", e)))?;

        Ok(())
    }
}
