//! IdempotencyStore port - persisted operation records for the ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::foundation::DomainError;

/// Lifecycle status of an idempotent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// An execution is in flight (or crashed mid-flight).
    Processing,
    /// The operation finished; its result is stored.
    Completed,
    /// The operation exhausted its attempts; its error is stored.
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Processing => "processing",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }
}

/// Stored record for one idempotency key.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    /// Deterministic key derived from operation name and parameters.
    pub key: String,
    pub operation_name: String,
    pub status: OperationStatus,
    /// Stored result for completed operations.
    pub result: Option<Value>,
    /// Stored error message for failed operations.
    pub error: Option<String>,
    /// Number of execution attempts consumed so far.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Whether this record is older than the given number of seconds.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: i64) -> bool {
        (now - self.updated_at).num_seconds() > max_age_secs
    }
}

/// Outcome of claiming a key for execution.
#[derive(Debug, Clone)]
pub enum BeginOutcome {
    /// No record existed; a Processing record was inserted atomically.
    Started,
    /// A record already exists; the caller decides how to proceed.
    Existing(IdempotencyRecord),
}

/// Port for the idempotency ledger's persistence.
///
/// `begin` must be atomic: two concurrent calls for the same key see
/// exactly one `Started`.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically insert a Processing record, or return the existing one.
    async fn begin(&self, key: &str, operation_name: &str) -> Result<BeginOutcome, DomainError>;

    /// Replace the record for a key with the given state.
    async fn update(&self, record: IdempotencyRecord) -> Result<(), DomainError>;

    /// Remove the record for a key, freeing it for re-execution.
    async fn remove(&self, key: &str) -> Result<(), DomainError>;

    /// Delete records last updated before the cutoff. Returns the count.
    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
