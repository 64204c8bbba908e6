//! Application handlers.
//!
//! Command handlers that orchestrate domain operations across ports.

pub mod billing;

pub use billing::{
    BillingEventDispatcher, CheckoutSessionOutcome, CheckoutUrls, CreateCheckoutSessionCommand,
    CreateCheckoutSessionHandler, CreatePortalSessionCommand, CreatePortalSessionHandler,
};
