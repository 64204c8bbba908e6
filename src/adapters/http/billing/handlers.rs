//! HTTP handlers for checkout, portal, and webhook endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{info, warn};

use crate::application::handlers::billing::{
    CheckoutSessionOutcome, CheckoutUrls, CreateCheckoutSessionCommand,
    CreateCheckoutSessionHandler, CreatePortalSessionCommand, CreatePortalSessionHandler,
};
use crate::domain::billing::{IdempotentWebhookProcessor, StripeWebhookVerifier, WebhookDispatcher};
use crate::domain::foundation::{RequestId, StoreId};
use crate::ports::{
    CheckoutAuditLog, CustomerRepository, PaymentProvider, StoreRepository,
    SubscriptionRepository, WebhookEventRepository, WebhookResult,
};

use super::dto::{
    CheckoutSessionResponse, CreateCheckoutSessionRequest, CreatePortalSessionRequest,
    PortalSessionResponse, WebhookAck,
};
use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::RequireAuth;

/// Shared state for the billing endpoints.
#[derive(Clone)]
pub struct BillingAppState {
    pub stores: Arc<dyn StoreRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub audit_log: Arc<dyn CheckoutAuditLog>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub webhook_dispatcher: Arc<dyn WebhookDispatcher>,
    pub webhook_verifier: Arc<StripeWebhookVerifier>,
    pub urls: CheckoutUrls,
}

impl BillingAppState {
    fn checkout_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.stores.clone(),
            self.customers.clone(),
            self.subscriptions.clone(),
            self.payment_provider.clone(),
            self.audit_log.clone(),
            self.urls.clone(),
        )
    }

    fn portal_handler(&self) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(
            self.stores.clone(),
            self.customers.clone(),
            self.payment_provider.clone(),
            self.audit_log.clone(),
            self.urls.portal_return_url.clone(),
        )
    }

    fn webhook_processor(
        &self,
    ) -> IdempotentWebhookProcessor<Arc<dyn WebhookEventRepository>, Arc<dyn WebhookDispatcher>>
    {
        IdempotentWebhookProcessor::new(
            self.webhook_events.clone(),
            self.webhook_dispatcher.clone(),
        )
    }
}

/// `POST /api/billing/create-checkout-session`
pub async fn create_checkout_session(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreateCheckoutSessionRequest>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::new();

    let store_id = parse_store_id(body.store_id, request_id)?;
    let price_id = body
        .price_id
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::validation("priceId", "priceId is required", request_id))?;

    let outcome = state
        .checkout_handler()
        .handle(CreateCheckoutSessionCommand {
            user,
            store_id,
            price_id,
            request_id,
        })
        .await
        .map_err(|error| ApiError::new(error, request_id))?;

    Ok(match outcome {
        CheckoutSessionOutcome::Checkout(session) => (
            StatusCode::OK,
            Json(CheckoutSessionResponse {
                id: session.id,
                url: session.url,
                success: true,
            }),
        )
            .into_response(),
        CheckoutSessionOutcome::Portal(session) => {
            (StatusCode::OK, Json(PortalSessionResponse { url: session.url })).into_response()
        }
    })
}

/// `POST /api/billing/create-portal-session`
pub async fn create_portal_session(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreatePortalSessionRequest>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::new();
    let store_id = parse_store_id(body.store_id, request_id)?;

    let session = state
        .portal_handler()
        .handle(CreatePortalSessionCommand {
            user,
            store_id,
            request_id,
        })
        .await
        .map_err(|error| ApiError::new(error, request_id))?;

    Ok((StatusCode::OK, Json(PortalSessionResponse { url: session.url })).into_response())
}

/// `POST /api/billing/stripe-webhook`
///
/// No bearer auth; authenticity comes from the signature over the raw body.
/// Answers 200 only when the event is fully handled (or a known duplicate /
/// ignorable type); everything else answers 400 so Stripe redelivers.
pub async fn stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        warn!("webhook delivery without Stripe-Signature header");
        return webhook_error(StatusCode::BAD_REQUEST, "Missing Stripe-Signature header");
    };

    let event = match state.webhook_verifier.verify_and_parse(&body, signature) {
        Ok(event) => event,
        Err(error) => {
            warn!(%error, "webhook signature verification failed");
            return webhook_error(error.status_code(), &error.to_string());
        }
    };

    let event_id = event.id.clone();
    match state.webhook_processor().process(event).await {
        Ok(result) => {
            let outcome = match result {
                WebhookResult::Processed => "processed",
                WebhookResult::Ignored => "ignored",
                WebhookResult::AlreadyProcessed => "already_processed",
            };
            info!(%event_id, outcome, "webhook acknowledged");
            (
                StatusCode::OK,
                Json(WebhookAck {
                    received: true,
                    outcome: outcome.to_string(),
                }),
            )
                .into_response()
        }
        Err(error) => {
            warn!(%event_id, %error, "webhook processing failed");
            webhook_error(error.status_code(), &error.to_string())
        }
    }
}

fn webhook_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn parse_store_id(raw: Option<String>, request_id: RequestId) -> Result<StoreId, ApiError> {
    raw.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::validation("storeId", "storeId is required", request_id))?
        .parse::<StoreId>()
        .map_err(|_| ApiError::validation("storeId", "storeId must be a UUID", request_id))
}
