//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Billing Ports
//!
//! - `PaymentProvider` - Stripe prices, customers, subscriptions, sessions
//! - `StoreRepository` - Tenant store lookup and subscription state
//! - `CustomerRepository` - Store-to-provider-customer mapping
//! - `SubscriptionRepository` - Persisted subscription state
//! - `WebhookEventRepository` - Webhook idempotency tracking
//! - `CheckoutAuditLog` - Append-only record of checkout attempts
//!
//! ## ERP Ports
//!
//! - `ErpGateway` - Tiny ERP OAuth flow and API proxying
//! - `ErpCredentialRepository` - Per-store ERP OAuth credentials
//!
//! ## Infrastructure Ports
//!
//! - `IdempotencyStore` - Operation records for the idempotency ledger
//! - `SessionValidator` - JWT validation and user identity
//! - `RateLimiter` - Fixed-window request limiting

mod checkout_audit_log;
mod customer_repository;
mod erp_credential_repository;
mod erp_gateway;
mod idempotency_store;
mod payment_provider;
mod rate_limiter;
mod session_validator;
mod store_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use checkout_audit_log::{AuditSessionKind, AuditStatus, CheckoutAuditEntry, CheckoutAuditLog};
pub use customer_repository::{CustomerMapping, CustomerRepository};
pub use erp_credential_repository::ErpCredentialRepository;
pub use erp_gateway::{
    ErpApiRequest, ErpApiResponse, ErpError, ErpGateway, ErpMethod, TokenGrant,
};
pub use idempotency_store::{BeginOutcome, IdempotencyRecord, IdempotencyStore, OperationStatus};
pub use payment_provider::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession, PriceInfo, ProviderCustomer, ProviderSubscription,
};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};
pub use session_validator::SessionValidator;
pub use store_repository::{Store, StoreRepository};
pub use subscription_repository::SubscriptionRepository;
pub use webhook_event_repository::{
    ClaimResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};
