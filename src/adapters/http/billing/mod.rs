//! HTTP surface for checkout, portal, and webhook processing.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::BillingAppState;
pub use routes::billing_routes;
