//! HTTP middleware: bearer authentication and rate limiting.

pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAuth};
pub use rate_limit::{client_ip, rate_limit_middleware, RateLimitCheck, RateLimitState};
