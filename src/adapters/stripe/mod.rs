//! Stripe adapter - `PaymentProvider` implementation over Stripe's REST API.

mod api_types;
mod stripe_adapter;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
