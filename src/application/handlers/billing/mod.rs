//! Billing command handlers.

mod create_checkout_session;
mod create_portal_session;
mod webhook_handlers;

pub use create_checkout_session::{
    CheckoutSessionOutcome, CheckoutUrls, CreateCheckoutSessionCommand,
    CreateCheckoutSessionHandler,
};
pub use create_portal_session::{CreatePortalSessionCommand, CreatePortalSessionHandler};
pub use webhook_handlers::BillingEventDispatcher;
