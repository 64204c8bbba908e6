//! Billing domain - subscription reconciliation driven by Stripe webhooks.

mod stripe_event;
mod subscription;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use stripe_event::{StripeEvent, StripeEventData, StripeEventType};
pub use subscription::{StoreSubscription, SubscriptionStatus};
pub use webhook_errors::WebhookError;
pub use webhook_processor::{IdempotentWebhookProcessor, WebhookDispatcher};
pub use webhook_verifier::{SignatureHeader, StripeWebhookVerifier};

pub(crate) use webhook_verifier::hex_encode;

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
