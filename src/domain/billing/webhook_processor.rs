//! Idempotent webhook processing.
//!
//! Wraps event dispatch with a claim-first dedup gate:
//!
//! 1. Claim the event id (atomic insert). A duplicate delivery short-circuits
//!    to `AlreadyProcessed` without running any handler.
//! 2. Dispatch the event to its handler.
//! 3. Record the outcome (success / ignored / failed) with the raw payload.
//!
//! Claiming before dispatch means two concurrent deliveries can never both
//! run a handler. When dispatch fails with a retryable error the claim is
//! released again, so Stripe's redelivery re-runs the handler instead of
//! short-circuiting to `AlreadyProcessed`; permanent failures keep the claim
//! and record a `failed` outcome.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::ports::{ClaimResult, WebhookEventRecord, WebhookEventRepository, WebhookResult};

use super::stripe_event::StripeEvent;
use super::webhook_errors::WebhookError;

/// Dispatches a verified event to the matching handler.
///
/// Implementations return `WebhookError::Ignored` for event types they do
/// not handle.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError>;
}

#[async_trait]
impl WebhookDispatcher for std::sync::Arc<dyn WebhookDispatcher> {
    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        (**self).dispatch(event).await
    }
}

/// Webhook processor that guarantees at-most-once handler execution per
/// provider event id.
pub struct IdempotentWebhookProcessor<R, D>
where
    R: WebhookEventRepository,
    D: WebhookDispatcher,
{
    repository: R,
    dispatcher: D,
}

impl<R, D> IdempotentWebhookProcessor<R, D>
where
    R: WebhookEventRepository,
    D: WebhookDispatcher,
{
    pub fn new(repository: R, dispatcher: D) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Process a verified webhook event.
    pub async fn process(&self, event: StripeEvent) -> Result<WebhookResult, WebhookError> {
        let claim = self
            .repository
            .claim(&event.id, &event.event_type)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        if claim == ClaimResult::AlreadyExists {
            info!(event_id = %event.id, "duplicate webhook delivery skipped");
            return Ok(WebhookResult::AlreadyProcessed);
        }

        let payload = serde_json::to_value(&event)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        match self.dispatcher.dispatch(&event).await {
            Ok(()) => {
                let record =
                    WebhookEventRecord::success(&event.id, &event.event_type, payload);
                self.repository
                    .record_outcome(record)
                    .await
                    .map_err(|e| WebhookError::Database(e.to_string()))?;
                info!(event_id = %event.id, event_type = %event.event_type, "webhook processed");
                Ok(WebhookResult::Processed)
            }
            Err(WebhookError::Ignored(reason)) => {
                let record =
                    WebhookEventRecord::ignored(&event.id, &event.event_type, &reason, payload);
                self.repository
                    .record_outcome(record)
                    .await
                    .map_err(|e| WebhookError::Database(e.to_string()))?;
                info!(event_id = %event.id, %reason, "webhook ignored");
                Ok(WebhookResult::Ignored)
            }
            Err(err) if err.is_retryable() => {
                // Give the claim back: the 400 makes Stripe redeliver, and
                // the redelivery must run the handler, not hit the gate.
                if let Err(release_err) = self.repository.release(&event.id).await {
                    warn!(event_id = %event.id, error = %release_err, "failed to release webhook claim");
                }
                warn!(event_id = %event.id, error = %err, "webhook handler failed, awaiting redelivery");
                Err(err)
            }
            Err(err) => {
                let record = WebhookEventRecord::failed(
                    &event.id,
                    &event.event_type,
                    err.to_string(),
                    payload,
                );
                // Outcome recording is best effort; the dispatch error wins.
                if let Err(record_err) = self.repository.record_outcome(record).await {
                    warn!(event_id = %event.id, error = %record_err, "failed to record webhook outcome");
                }
                warn!(event_id = %event.id, error = %err, "webhook handler failed");
                Err(err)
            }
        }
    }
}
