//! HTTP adapter: axum routes, middleware, and the shared error envelope.

pub mod billing;
pub mod erp;
pub mod error;
pub mod middleware;

pub use billing::{billing_routes, BillingAppState};
pub use erp::{erp_routes, ErpAppState};
pub use error::{ApiError, ErrorResponse};

use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::trace::TraceLayer;

use self::middleware::{auth_middleware, rate_limit_middleware, AuthState, RateLimitState};

/// Assemble the full API router.
///
/// Rate limiting runs before authentication so floods are shed without
/// paying for token validation. Authentication is pass-through; handlers
/// that need a user enforce it with `RequireAuth`.
pub fn api_router(
    billing: BillingAppState,
    erp: ErpAppState,
    validator: AuthState,
    limiter: RateLimitState,
) -> Router {
    Router::new()
        .nest("/api/billing", billing_routes().with_state(billing))
        .nest("/api/erp", erp_routes().with_state(erp))
        .layer(from_fn_with_state(validator, auth_middleware))
        .layer(from_fn_with_state(limiter, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
}
