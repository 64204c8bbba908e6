//! IdempotencyLedger - exactly-once execution of side-effecting operations.
//!
//! Callers wrap an operation in [`IdempotencyLedger::execute`]; the ledger
//! derives a deterministic key from the operation name and parameters,
//! claims it in the [`IdempotencyStore`], and runs the operation with
//! bounded retries. Replays of a completed operation return the stored
//! result without re-executing; replays of an exhausted failure return the
//! stored error. Callers that arrive while another worker holds the key
//! wait for that execution and receive its stored outcome, so N concurrent
//! calls with the same key all resolve to the identical result. Records
//! untouched for longer than the staleness window are treated as crashed
//! executions and discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::billing::hex_encode;
use crate::domain::foundation::DomainError;
use crate::ports::{BeginOutcome, IdempotencyRecord, IdempotencyStore, OperationStatus};

/// Records untouched for longer than this are considered crashed.
pub const STALE_AFTER_SECS: i64 = 15 * 60;

/// How often a waiting caller re-checks an in-flight record.
const IN_FLIGHT_POLL_MS: u64 = 50;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `retry_delay * 2^(attempt - 1)`: 1s, 2s, 4s, ...
    Exponential,
    /// `retry_delay * attempt`: 1s, 2s, 3s, ...
    Linear,
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, retry_delay_ms: u64, attempt: u32) -> Duration {
        let ms = match self {
            Backoff::Exponential => retry_delay_ms.saturating_mul(1u64 << (attempt - 1).min(31)),
            Backoff::Linear => retry_delay_ms.saturating_mul(attempt as u64),
        };
        Duration::from_millis(ms)
    }
}

/// Per-call knobs for [`IdempotencyLedger::execute`].
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Total attempts before the operation is recorded as failed.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    pub backoff: Backoff,
    /// Invoked once after a fresh execution completes.
    pub on_complete: Option<Arc<dyn Fn(&Value) + Send + Sync>>,
    /// Invoked after every failed attempt, final or not.
    pub on_error: Option<Arc<dyn Fn(&DomainError) + Send + Sync>>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            backoff: Backoff::Exponential,
            on_complete: None,
            on_error: None,
        }
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("backoff", &self.backoff)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Errors surfaced by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The operation failed on its final attempt (now or previously).
    #[error("operation failed: {0}")]
    Failed(DomainError),

    /// The ledger's own persistence failed.
    #[error("idempotency store error: {0}")]
    Store(DomainError),

    /// A stored result could not be (de)serialized.
    #[error("result serialization error: {0}")]
    Serialization(String),
}

/// Exactly-once execution coordinator backed by an [`IdempotencyStore`].
pub struct IdempotencyLedger {
    store: Arc<dyn IdempotencyStore>,
    stale_after_secs: i64,
}

impl IdempotencyLedger {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            store,
            stale_after_secs: STALE_AFTER_SECS,
        }
    }

    #[cfg(test)]
    fn with_staleness(store: Arc<dyn IdempotencyStore>, stale_after_secs: i64) -> Self {
        Self {
            store,
            stale_after_secs,
        }
    }

    /// Derive the ledger key for an operation and its parameters.
    ///
    /// The params value is canonicalized (object keys sorted) before
    /// hashing so that logically equal parameter sets map to the same key.
    pub fn derive_key(operation_name: &str, params: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(operation_name.as_bytes());
        hasher.update(b":");
        hasher.update(canonical_json(params).as_bytes());
        hex_encode(&hasher.finalize())
    }

    /// Execute `operation` at most once for this (name, params) pair.
    ///
    /// Retries transient failures with the configured backoff inside a
    /// single call; the retry loop is explicit and bounded by
    /// `options.max_attempts`. While another worker holds the key, this
    /// call waits for that execution and returns its stored outcome, so
    /// every concurrent caller sees the identical result.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        params: &Value,
        operation: F,
        options: ExecuteOptions,
    ) -> Result<T, LedgerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
        T: Serialize + DeserializeOwned,
    {
        let key = Self::derive_key(operation_name, params);

        loop {
            let record = match self
                .store
                .begin(&key, operation_name)
                .await
                .map_err(LedgerError::Store)?
            {
                BeginOutcome::Started => self.fresh_record(&key, operation_name),
                BeginOutcome::Existing(record) => {
                    match self.resolve_existing(&key, operation_name, record).await? {
                        Resolution::Replay(value) => {
                            let result = serde_json::from_value(value)
                                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                            return Ok(result);
                        }
                        Resolution::Resume(record) => record,
                        Resolution::Wait => {
                            tokio::time::sleep(Duration::from_millis(IN_FLIGHT_POLL_MS)).await;
                            continue;
                        }
                    }
                }
            };

            return self.run_attempts(record, operation, options).await;
        }
    }

    /// Delete records last updated before the staleness cutoff.
    pub async fn sweep_stale(&self) -> Result<u64, LedgerError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.stale_after_secs);
        let removed = self
            .store
            .delete_stale(cutoff)
            .await
            .map_err(LedgerError::Store)?;
        if removed > 0 {
            debug!(removed, "swept stale idempotency records");
        }
        Ok(removed)
    }

    /// Spawn a background task sweeping stale records on a fixed interval.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = self.sweep_stale().await {
                    warn!(%error, "idempotency sweep failed");
                }
            }
        })
    }

    fn fresh_record(&self, key: &str, operation_name: &str) -> IdempotencyRecord {
        let now = Utc::now();
        IdempotencyRecord {
            key: key.to_string(),
            operation_name: operation_name.to_string(),
            status: OperationStatus::Processing,
            result: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decide what an existing record means for this call.
    async fn resolve_existing(
        &self,
        key: &str,
        operation_name: &str,
        record: IdempotencyRecord,
    ) -> Result<Resolution, LedgerError> {
        let now = Utc::now();

        // Crashed or abandoned execution: discard and start over.
        if record.is_stale(now, self.stale_after_secs) {
            warn!(
                key,
                operation = operation_name,
                status = record.status.as_str(),
                "discarding stale idempotency record"
            );
            self.store.remove(key).await.map_err(LedgerError::Store)?;
            return Ok(Resolution::Resume(self.fresh_record(key, operation_name)));
        }

        match record.status {
            OperationStatus::Completed => {
                debug!(key, operation = operation_name, "returning stored result");
                let value = record.result.ok_or_else(|| {
                    LedgerError::Serialization("completed record has no result".to_string())
                })?;
                Ok(Resolution::Replay(value))
            }
            OperationStatus::Processing => {
                debug!(key, operation = operation_name, "waiting on in-flight execution");
                Ok(Resolution::Wait)
            }
            OperationStatus::Failed => {
                Err(LedgerError::Failed(DomainError::new(
                    crate::domain::foundation::ErrorCode::UnknownError,
                    record
                        .error
                        .unwrap_or_else(|| "operation previously failed".to_string()),
                )))
            }
        }
    }

    async fn run_attempts<F, Fut, T>(
        &self,
        mut record: IdempotencyRecord,
        operation: F,
        options: ExecuteOptions,
    ) -> Result<T, LedgerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
        T: Serialize + DeserializeOwned,
    {
        loop {
            record.attempts += 1;
            record.status = OperationStatus::Processing;
            record.updated_at = Utc::now();
            self.store
                .update(record.clone())
                .await
                .map_err(LedgerError::Store)?;

            match operation().await {
                Ok(value) => {
                    let stored = serde_json::to_value(&value)
                        .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                    record.status = OperationStatus::Completed;
                    record.result = Some(stored.clone());
                    record.error = None;
                    record.updated_at = Utc::now();
                    self.store
                        .update(record)
                        .await
                        .map_err(LedgerError::Store)?;
                    if let Some(callback) = &options.on_complete {
                        callback(&stored);
                    }
                    return Ok(value);
                }
                Err(error) if record.attempts >= options.max_attempts => {
                    record.status = OperationStatus::Failed;
                    record.error = Some(error.to_string());
                    record.updated_at = Utc::now();
                    self.store
                        .update(record.clone())
                        .await
                        .map_err(LedgerError::Store)?;
                    if let Some(callback) = &options.on_error {
                        callback(&error);
                    }
                    warn!(
                        key = %record.key,
                        operation = %record.operation_name,
                        attempts = record.attempts,
                        "operation failed after final attempt"
                    );
                    return Err(LedgerError::Failed(error));
                }
                Err(error) => {
                    if let Some(callback) = &options.on_error {
                        callback(&error);
                    }
                    let delay = options
                        .backoff
                        .delay_after(options.retry_delay_ms, record.attempts);
                    debug!(
                        key = %record.key,
                        operation = %record.operation_name,
                        attempt = record.attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

enum Resolution {
    /// A completed record exists; return its stored result.
    Replay(Value),
    /// Execute (or re-execute) starting from this record.
    Resume(IdempotencyRecord),
    /// Another worker holds the key; poll until its execution resolves.
    Wait,
}

/// Serialize a JSON value with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key).unwrap_or_default());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Store
    // ════════════════════════════════════════════════════════════════════════════

    struct MockStore {
        records: Mutex<HashMap<String, IdempotencyRecord>>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
            }
        }

        fn insert(&self, record: IdempotencyRecord) {
            self.records
                .lock()
                .unwrap()
                .insert(record.key.clone(), record);
        }

        fn get(&self, key: &str) -> Option<IdempotencyRecord> {
            self.records.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl IdempotencyStore for MockStore {
        async fn begin(
            &self,
            key: &str,
            operation_name: &str,
        ) -> Result<BeginOutcome, DomainError> {
            let mut records = self.records.lock().unwrap();
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
            self.records
                .lock()
                .unwrap()
                .insert(record.key.clone(), record);
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), DomainError> {
            self.records.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|_, r| r.updated_at >= cutoff);
            Ok((before - records.len()) as u64)
        }
    }

    fn params() -> Value {
        json!({"store_id": "store-1", "price_id": "price_123"})
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Key Derivation
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn same_params_same_key() {
        let a = IdempotencyLedger::derive_key("create_checkout", &params());
        let b = IdempotencyLedger::derive_key("create_checkout", &params());
        assert_eq!(a, b);
    }

    #[test]
    fn key_order_does_not_matter() {
        let a = IdempotencyLedger::derive_key(
            "op",
            &json!({"a": 1, "b": {"x": true, "y": false}}),
        );
        let b = IdempotencyLedger::derive_key(
            "op",
            &json!({"b": {"y": false, "x": true}, "a": 1}),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_operation_different_key() {
        let a = IdempotencyLedger::derive_key("op_a", &params());
        let b = IdempotencyLedger::derive_key("op_b", &params());
        assert_ne!(a, b);
    }

    #[test]
    fn different_params_different_key() {
        let a = IdempotencyLedger::derive_key("op", &json!({"n": 1}));
        let b = IdempotencyLedger::derive_key("op", &json!({"n": 2}));
        assert_ne!(a, b);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Backoff
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn exponential_backoff_doubles() {
        let b = Backoff::Exponential;
        assert_eq!(b.delay_after(1000, 1), Duration::from_millis(1000));
        assert_eq!(b.delay_after(1000, 2), Duration::from_millis(2000));
        assert_eq!(b.delay_after(1000, 3), Duration::from_millis(4000));
    }

    #[test]
    fn linear_backoff_grows_by_base() {
        let b = Backoff::Linear;
        assert_eq!(b.delay_after(1000, 1), Duration::from_millis(1000));
        assert_eq!(b.delay_after(1000, 2), Duration::from_millis(2000));
        assert_eq!(b.delay_after(1000, 3), Duration::from_millis(3000));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Execution
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn executes_and_stores_result() {
        let store = Arc::new(MockStore::new());
        let ledger = IdempotencyLedger::new(store.clone());

        let result: String = ledger
            .execute(
                "create_checkout",
                &params(),
                || async { Ok("cs_123".to_string()) },
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result, "cs_123");

        let key = IdempotencyLedger::derive_key("create_checkout", &params());
        let record = store.get(&key).unwrap();
        assert_eq!(record.status, OperationStatus::Completed);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.result, Some(json!("cs_123")));
    }

    #[tokio::test]
    async fn replay_returns_stored_result_without_executing() {
        let store = Arc::new(MockStore::new());
        let ledger = IdempotencyLedger::new(store.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let operation = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42u64)
            }
        };

        let first: u64 = ledger
            .execute("op", &params(), operation, ExecuteOptions::default())
            .await
            .unwrap();
        let second: u64 = ledger
            .execute("op", &params(), operation, ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let store = Arc::new(MockStore::new());
        let ledger = IdempotencyLedger::new(store.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let result: u32 = ledger
            .execute(
                "flaky",
                &params(),
                move || {
                    let calls = calls_ref.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Err(DomainError::new(ErrorCode::StripeError, "transient"))
                        } else {
                            Ok(7u32)
                        }
                    }
                },
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let key = IdempotencyLedger::derive_key("flaky", &params());
        let record = store.get(&key).unwrap();
        assert_eq!(record.status, OperationStatus::Completed);
        assert_eq!(record.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_after_max_attempts_and_stores_error() {
        let store = Arc::new(MockStore::new());
        let ledger = IdempotencyLedger::new(store.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let result: Result<u32, _> = ledger
            .execute(
                "doomed",
                &params(),
                move || {
                    let calls = calls_ref.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(DomainError::new(ErrorCode::StripeError, "hard down"))
                    }
                },
                ExecuteOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::Failed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let key = IdempotencyLedger::derive_key("doomed", &params());
        let record = store.get(&key).unwrap();
        assert_eq!(record.status, OperationStatus::Failed);
        assert!(record.error.as_deref().unwrap_or("").contains("hard down"));
    }

    #[tokio::test]
    async fn replay_of_exhausted_failure_rethrows_without_executing() {
        let store = Arc::new(MockStore::new());
        let key = IdempotencyLedger::derive_key("op", &params());
        let now = Utc::now();
        store.insert(IdempotencyRecord {
            key: key.clone(),
            operation_name: "op".to_string(),
            status: OperationStatus::Failed,
            result: None,
            error: Some("previous failure".to_string()),
            attempts: 3,
            created_at: now,
            updated_at: now,
        });

        let ledger = IdempotencyLedger::new(store);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let result: Result<u32, _> = ledger
            .execute(
                "op",
                &params(),
                move || {
                    let calls = calls_ref.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(1u32)
                    }
                },
                ExecuteOptions::default(),
            )
            .await;

        match result {
            Err(LedgerError::Failed(error)) => {
                assert!(error.to_string().contains("previous failure"));
            }
            other => panic!("expected stored failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_execution() {
        let store = Arc::new(MockStore::new());
        let ledger = Arc::new(IdempotencyLedger::new(store));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = ledger.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .execute(
                        "op",
                        &params(),
                        move || {
                            let calls = calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(200)).await;
                                Ok(42u64)
                            }
                        },
                        ExecuteOptions::default(),
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_receive_the_stored_failure() {
        let store = Arc::new(MockStore::new());
        let ledger = Arc::new(IdempotencyLedger::new(store));
        let calls = Arc::new(AtomicU32::new(0));

        let options = ExecuteOptions {
            max_attempts: 1,
            ..ExecuteOptions::default()
        };
        let mut handles = Vec::new();
        for _ in 0..3 {
            let ledger = ledger.clone();
            let calls = calls.clone();
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .execute(
                        "op",
                        &params(),
                        move || {
                            let calls = calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(100)).await;
                                Err::<u64, _>(DomainError::new(
                                    ErrorCode::StripeError,
                                    "hard down",
                                ))
                            }
                        },
                        options,
                    )
                    .await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Err(LedgerError::Failed(error)) => {
                    assert!(error.to_string().contains("hard down"));
                }
                other => panic!("expected the stored failure, got {other:?}"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_record_is_discarded_and_reexecuted() {
        let store = Arc::new(MockStore::new());
        let key = IdempotencyLedger::derive_key("op", &params());
        let stale_time = Utc::now() - ChronoDuration::minutes(16);
        store.insert(IdempotencyRecord {
            key: key.clone(),
            operation_name: "op".to_string(),
            status: OperationStatus::Processing,
            result: None,
            error: None,
            attempts: 2,
            created_at: stale_time,
            updated_at: stale_time,
        });

        let ledger = IdempotencyLedger::new(store.clone());
        let result: u32 = ledger
            .execute(
                "op",
                &params(),
                || async { Ok(9u32) },
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result, 9);
        let record = store.get(&key).unwrap();
        assert_eq!(record.status, OperationStatus::Completed);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn stale_completed_record_is_discarded_and_reexecuted() {
        let store = Arc::new(MockStore::new());
        let key = IdempotencyLedger::derive_key("op", &params());
        let stale_time = Utc::now() - ChronoDuration::minutes(16);
        store.insert(IdempotencyRecord {
            key: key.clone(),
            operation_name: "op".to_string(),
            status: OperationStatus::Completed,
            result: Some(json!(1)),
            error: None,
            attempts: 1,
            created_at: stale_time,
            updated_at: stale_time,
        });

        // Expiry bounds replay of stored results: a completed record past
        // the window no longer answers for the operation.
        let ledger = IdempotencyLedger::new(store.clone());
        let result: u32 = ledger
            .execute(
                "op",
                &params(),
                || async { Ok(9u32) },
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result, 9);
        assert_eq!(store.get(&key).unwrap().result, Some(json!(9)));
    }

    #[tokio::test]
    async fn on_complete_callback_fires_once() {
        let store = Arc::new(MockStore::new());
        let ledger = IdempotencyLedger::new(store);
        let completions = Arc::new(AtomicU32::new(0));

        let completions_ref = completions.clone();
        let options = ExecuteOptions {
            on_complete: Some(Arc::new(move |_| {
                completions_ref.fetch_add(1, Ordering::SeqCst);
            })),
            ..ExecuteOptions::default()
        };

        let _: u32 = ledger
            .execute("op", &params(), || async { Ok(5u32) }, options.clone())
            .await
            .unwrap();
        // Replay: stored result, no callback.
        let _: u32 = ledger
            .execute("op", &params(), || async { Ok(5u32) }, options)
            .await
            .unwrap();

        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_error_callback_fires_after_each_failed_attempt() {
        let store = Arc::new(MockStore::new());
        let ledger = IdempotencyLedger::new(store);
        let errors = Arc::new(AtomicU32::new(0));

        let errors_ref = errors.clone();
        let options = ExecuteOptions {
            max_attempts: 3,
            on_error: Some(Arc::new(move |_| {
                errors_ref.fetch_add(1, Ordering::SeqCst);
            })),
            ..ExecuteOptions::default()
        };

        let result: Result<u32, _> = ledger
            .execute(
                "op",
                &params(),
                || async { Err(DomainError::new(ErrorCode::StripeError, "down")) },
                options,
            )
            .await;

        assert!(result.is_err());
        // Once per failed attempt, the final one included.
        assert_eq!(errors.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_records() {
        let store = Arc::new(MockStore::new());
        let now = Utc::now();
        let stale_time = now - ChronoDuration::minutes(20);
        store.insert(IdempotencyRecord {
            key: "stale".to_string(),
            operation_name: "op".to_string(),
            status: OperationStatus::Processing,
            result: None,
            error: None,
            attempts: 1,
            created_at: stale_time,
            updated_at: stale_time,
        });
        store.insert(IdempotencyRecord {
            key: "fresh".to_string(),
            operation_name: "op".to_string(),
            status: OperationStatus::Completed,
            result: Some(json!(1)),
            error: None,
            attempts: 1,
            created_at: now,
            updated_at: now,
        });

        let ledger = IdempotencyLedger::with_staleness(store.clone(), STALE_AFTER_SECS);
        let removed = ledger.sweep_stale().await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("fresh").is_some());
    }
}

#[cfg(test)]
mod backoff_props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn exponential_delay_never_decreases(base in 1u64..10_000, attempt in 1u32..20) {
            let current = Backoff::Exponential.delay_after(base, attempt);
            let next = Backoff::Exponential.delay_after(base, attempt + 1);
            prop_assert!(next >= current);
        }

        #[test]
        fn linear_delay_is_base_times_attempt(base in 1u64..10_000, attempt in 1u32..1000) {
            let delay = Backoff::Linear.delay_after(base, attempt);
            prop_assert_eq!(delay.as_millis() as u64, base * attempt as u64);
        }

        #[test]
        fn exponential_delay_saturates_instead_of_overflowing(attempt in 1u32..500) {
            // Large attempt counts must clamp, not panic.
            let delay = Backoff::Exponential.delay_after(u64::MAX / 2, attempt);
            prop_assert!(delay.as_millis() > 0);
        }
    }
}
