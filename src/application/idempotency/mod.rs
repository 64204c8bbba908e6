//! Idempotency ledger for exactly-once operation execution.

mod ledger;

pub use ledger::{Backoff, ExecuteOptions, IdempotencyLedger, LedgerError, STALE_AFTER_SECS};
