//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - JWT session validation against the OIDC provider
//! - `erp` - Tiny ERP OAuth and API client
//! - `http` - axum routes, middleware, and error envelope
//! - `idempotency` - in-memory idempotency store for tests
//! - `postgres` - sqlx repositories
//! - `rate_limiter` - fixed-window limiters (in-memory, Redis)
//! - `stripe` - payment provider client

pub mod auth;
pub mod erp;
pub mod http;
pub mod idempotency;
pub mod postgres;
pub mod rate_limiter;
pub mod stripe;
