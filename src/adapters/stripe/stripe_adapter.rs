//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against Stripe's form-encoded
//! REST API. Secrets are held in `secrecy::SecretString`; requests
//! authenticate via HTTP basic auth with the secret key.
//!
//! Webhook signature verification lives in the domain layer
//! (`StripeWebhookVerifier`), not here.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::error;

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::StoreId;
use crate::ports::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession, PriceInfo, ProviderCustomer, ProviderSubscription,
};

use super::api_types::{
    StripeCheckoutSession, StripeCustomer, StripeErrorEnvelope, StripePortalSession, StripePrice,
    StripeSubscription,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Map a non-2xx Stripe response to a `PaymentError`.
    async fn api_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let code = match status.as_u16() {
            401 | 403 => PaymentErrorCode::AuthenticationFailed,
            404 => PaymentErrorCode::NotFound,
            400..=499 => PaymentErrorCode::InvalidRequest,
            _ => PaymentErrorCode::ProviderUnavailable,
        };

        let body = response.text().await.unwrap_or_default();
        let parsed: Option<StripeErrorEnvelope> = serde_json::from_str(&body).ok();
        let (message, provider_code) = match parsed {
            Some(envelope) => (
                envelope
                    .error
                    .message
                    .unwrap_or_else(|| format!("Stripe API error ({status})")),
                envelope.error.code,
            ),
            None => (format!("Stripe API error ({status}): {body}"), None),
        };

        error!(%status, %message, "Stripe API call failed");
        let mut err = PaymentError::new(code, message);
        if let Some(provider_code) = provider_code {
            err = err.with_provider_code(provider_code);
        }
        err
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let parsed = response
            .json()
            .await
            .map_err(|e| PaymentError::invalid_response(e.to_string()))?;
        Ok(Some(parsed))
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::invalid_response(e.to_string()))
    }
}

fn price_info(price: StripePrice) -> PriceInfo {
    PriceInfo {
        id: price.id,
        active: price.active,
        currency: price.currency,
        unit_amount: price.unit_amount,
    }
}

fn provider_subscription(sub: StripeSubscription) -> Result<ProviderSubscription, PaymentError> {
    let price_id = sub
        .items
        .data
        .first()
        .map(|item| item.price.id.clone())
        .ok_or_else(|| PaymentError::invalid_response("subscription has no items"))?;

    Ok(ProviderSubscription {
        id: sub.id,
        customer_id: sub.customer,
        price_id,
        status: SubscriptionStatus::from_provider(&sub.status),
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
    })
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn get_price(&self, price_id: &str) -> Result<Option<PriceInfo>, PaymentError> {
        let price: Option<StripePrice> = self.get_json(&format!("/v1/prices/{price_id}")).await?;
        Ok(price.map(price_info))
    }

    async fn get_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProviderCustomer>, PaymentError> {
        let customer: Option<StripeCustomer> = self
            .get_json(&format!("/v1/customers/{customer_id}"))
            .await?;
        Ok(customer.filter(|c| !c.deleted).map(|c| ProviderCustomer {
            id: c.id,
            email: c.email,
        }))
    }

    async fn create_customer(
        &self,
        email: &str,
        store_id: StoreId,
    ) -> Result<ProviderCustomer, PaymentError> {
        let params = [
            ("email", email.to_string()),
            ("metadata[storeId]", store_id.to_string()),
        ];
        let customer: StripeCustomer = self.post_form("/v1/customers", &params, None).await?;
        Ok(ProviderCustomer {
            id: customer.id,
            email: customer.email,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, PaymentError> {
        let sub: Option<StripeSubscription> = self
            .get_json(&format!("/v1/subscriptions/{subscription_id}"))
            .await?;
        let sub = sub.ok_or_else(|| {
            PaymentError::not_found(format!("No such subscription: {subscription_id}"))
        })?;
        provider_subscription(sub)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = [
            ("mode", "subscription".to_string()),
            ("customer", request.customer_id),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            (
                "allow_promotion_codes",
                request.allow_promotion_codes.to_string(),
            ),
            ("metadata[storeId]", request.store_id.to_string()),
            ("metadata[requestId]", request.request_id.to_string()),
        ];

        let session: StripeCheckoutSession = self
            .post_form(
                "/v1/checkout/sessions",
                &params,
                Some(&request.idempotency_key),
            )
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::invalid_response("checkout session has no url"))?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        let portal: StripePortalSession = self
            .post_form("/v1/billing_portal/sessions", &params, None)
            .await?;
        Ok(PortalSession {
            id: portal.id,
            url: portal.url,
        })
    }
}
