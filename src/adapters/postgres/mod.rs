//! PostgreSQL adapters - database implementations of the repository ports.

mod checkout_audit_log;
mod customer_repository;
mod erp_credential_repository;
mod idempotency_store;
mod store_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use checkout_audit_log::PostgresCheckoutAuditLog;
pub use customer_repository::PostgresCustomerRepository;
pub use erp_credential_repository::PostgresErpCredentialRepository;
pub use idempotency_store::PostgresIdempotencyStore;
pub use store_repository::PostgresStoreRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
