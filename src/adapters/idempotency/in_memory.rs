//! In-memory implementation of IdempotencyStore.
//!
//! Suitable for tests and single-process deployments. A single mutex guards
//! the map, which makes `begin` atomic the same way the database primary key
//! does in the Postgres adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;
use crate::ports::{BeginOutcome, IdempotencyRecord, IdempotencyStore, OperationStatus};

/// In-memory idempotency store.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records. Test helper.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, IdempotencyRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(&self, key: &str, operation_name: &str) -> Result<BeginOutcome, DomainError> {
        let mut records = self.lock();
        if let Some(existing) = records.get(key) {
            return Ok(BeginOutcome::Existing(existing.clone()));
        }

        let now = Utc::now();
        records.insert(
            key.to_string(),
            IdempotencyRecord {
                key: key.to_string(),
                operation_name: operation_name.to_string(),
                status: OperationStatus::Processing,
                result: None,
                error: None,
                attempts: 0,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(BeginOutcome::Started)
    }

    async fn update(&self, record: IdempotencyRecord) -> Result<(), DomainError> {
        self.lock().insert(record.key.clone(), record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| record.updated_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn begin_claims_key_once() {
        let store = InMemoryIdempotencyStore::new();

        let first = store.begin("k1", "op").await.unwrap();
        assert!(matches!(first, BeginOutcome::Started));

        let second = store.begin("k1", "op").await.unwrap();
        match second {
            BeginOutcome::Existing(record) => {
                assert_eq!(record.status, OperationStatus::Processing);
                assert_eq!(record.operation_name, "op");
            }
            BeginOutcome::Started => panic!("expected existing record"),
        }
    }

    #[tokio::test]
    async fn remove_frees_key_for_reclaim() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("k1", "op").await.unwrap();
        store.remove("k1").await.unwrap();

        let outcome = store.begin("k1", "op").await.unwrap();
        assert!(matches!(outcome, BeginOutcome::Started));
    }

    #[tokio::test]
    async fn delete_stale_removes_only_old_records() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("old", "op").await.unwrap();
        store.begin("new", "op").await.unwrap();

        // Age the first record past the cutoff.
        {
            let mut records = store.lock();
            let old = records.get_mut("old").unwrap();
            old.updated_at = Utc::now() - Duration::minutes(20);
        }

        let deleted = store
            .delete_stale(Utc::now() - Duration::minutes(15))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.len(), 1);
    }
}
