//! Route definitions for the billing endpoints.

use axum::routing::post;
use axum::Router;

use super::handlers::{
    create_checkout_session, create_portal_session, stripe_webhook, BillingAppState,
};

/// Billing routes, mounted under `/api/billing`.
///
/// The webhook route shares the router; it simply never uses `RequireAuth`,
/// so the pass-through auth middleware leaves it alone.
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/create-portal-session", post(create_portal_session))
        .route("/stripe-webhook", post(stripe_webhook))
}
