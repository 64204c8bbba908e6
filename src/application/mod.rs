//! Application layer - commands, handlers, and cross-cutting services.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod erp;
pub mod handlers;
pub mod idempotency;

pub use erp::{CallQueue, TokenBroker, TokenBrokerError};
pub use handlers::{
    BillingEventDispatcher, CheckoutSessionOutcome, CheckoutUrls, CreateCheckoutSessionCommand,
    CreateCheckoutSessionHandler, CreatePortalSessionCommand, CreatePortalSessionHandler,
};
pub use idempotency::{Backoff, ExecuteOptions, IdempotencyLedger, LedgerError};
