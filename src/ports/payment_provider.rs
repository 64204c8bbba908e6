//! PaymentProvider port - Interface to the payment provider (Stripe).
//!
//! The domain and application layers speak this trait; the concrete Stripe
//! adapter lives under `adapters::stripe`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::{RequestId, StoreId};

/// A customer object at the payment provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCustomer {
    /// Provider customer id (cus_xxx).
    pub id: String,
    pub email: Option<String>,
}

/// A price object at the payment provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceInfo {
    /// Provider price id (price_xxx).
    pub id: String,
    /// Inactive prices must not be sold.
    pub active: bool,
    pub currency: String,
    pub unit_amount: Option<i64>,
}

/// A subscription object at the payment provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    /// Provider subscription id (sub_xxx).
    pub id: String,
    pub customer_id: String,
    pub price_id: String,
    pub status: SubscriptionStatus,
    /// End of the current billing period (Unix seconds).
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

/// Parameters for creating a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub store_id: StoreId,
    pub request_id: RequestId,
    /// Provider-side idempotency key; replays return the original session.
    pub idempotency_key: String,
    pub success_url: String,
    pub cancel_url: String,
    pub allow_promotion_codes: bool,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A created billing portal session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Error category for payment provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentErrorCode {
    /// Network failure reaching the provider.
    Network,
    /// The provider rejected the request (4xx).
    InvalidRequest,
    /// The provider returned an unexpected payload.
    InvalidResponse,
    /// Provider-side failure (5xx).
    ProviderUnavailable,
    /// Authentication with the provider failed (bad API key).
    AuthenticationFailed,
    /// The referenced object does not exist at the provider.
    NotFound,
}

impl PaymentErrorCode {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::Network | PaymentErrorCode::ProviderUnavailable
        )
    }
}

/// Error from the payment provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("payment provider error ({code:?}): {message}")]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    /// Provider-specific error code, when available.
    pub provider_code: Option<String>,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NotFound, message)
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

/// Port for payment provider operations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Fetch a price; `None` if it does not exist.
    async fn get_price(&self, price_id: &str) -> Result<Option<PriceInfo>, PaymentError>;

    /// Fetch a customer; `None` if it does not exist or was deleted.
    async fn get_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProviderCustomer>, PaymentError>;

    /// Create a customer tagged with the owning store.
    async fn create_customer(
        &self,
        email: &str,
        store_id: StoreId,
    ) -> Result<ProviderCustomer, PaymentError>;

    /// Fetch a subscription by provider id.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, PaymentError>;

    /// Create a checkout session for a new subscription.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Create a billing portal session for an existing customer.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(PaymentError::network("connection reset").is_retryable());
        assert!(PaymentError::new(PaymentErrorCode::ProviderUnavailable, "503").is_retryable());
    }

    #[test]
    fn request_errors_are_not_retryable() {
        assert!(!PaymentError::new(PaymentErrorCode::InvalidRequest, "bad param").is_retryable());
        assert!(!PaymentError::not_found("no such price").is_retryable());
        assert!(
            !PaymentError::new(PaymentErrorCode::AuthenticationFailed, "bad key").is_retryable()
        );
    }

    #[test]
    fn provider_code_is_attached() {
        let err = PaymentError::new(PaymentErrorCode::InvalidRequest, "no such customer")
            .with_provider_code("resource_missing");
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
    }
}
