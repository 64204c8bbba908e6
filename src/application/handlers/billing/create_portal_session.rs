//! CreatePortalSessionHandler - billing portal access for subscribed stores.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{AuthenticatedUser, DomainError, ErrorCode, RequestId, StoreId};
use crate::ports::{
    AuditSessionKind, CheckoutAuditEntry, CheckoutAuditLog, CustomerRepository, PaymentProvider,
    PortalSession, StoreRepository,
};

/// Command to open the billing portal for a store.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionCommand {
    pub user: AuthenticatedUser,
    pub store_id: StoreId,
    pub request_id: RequestId,
}

/// Handler for creating billing portal sessions.
///
/// Unlike checkout, the portal requires an existing provider customer;
/// a store that never started checkout has nothing to manage.
pub struct CreatePortalSessionHandler {
    stores: Arc<dyn StoreRepository>,
    customers: Arc<dyn CustomerRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    audit_log: Arc<dyn CheckoutAuditLog>,
    return_url: String,
}

impl CreatePortalSessionHandler {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        customers: Arc<dyn CustomerRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        audit_log: Arc<dyn CheckoutAuditLog>,
        return_url: String,
    ) -> Self {
        Self {
            stores,
            customers,
            payment_provider,
            audit_log,
            return_url,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePortalSessionCommand,
    ) -> Result<PortalSession, DomainError> {
        let not_found = || DomainError::new(ErrorCode::StoreNotFound, "Store not found");

        // Missing and not-owned stores are indistinguishable to the caller.
        let store = self
            .stores
            .find_by_id(cmd.store_id)
            .await?
            .ok_or_else(not_found)?;
        if !store.is_owned_by(&cmd.user.id) {
            return Err(not_found());
        }

        let result = self.create_portal(&cmd).await;
        match &result {
            Ok(session) => {
                self.audit(CheckoutAuditEntry::created(
                    cmd.request_id,
                    cmd.store_id,
                    None,
                    session.id.clone(),
                    AuditSessionKind::Portal,
                ))
                .await;
                info!(
                    request_id = %cmd.request_id,
                    store_id = %cmd.store_id,
                    "portal session created"
                );
            }
            Err(error) => {
                self.audit(CheckoutAuditEntry::error(
                    cmd.request_id,
                    cmd.store_id,
                    None,
                    AuditSessionKind::Portal,
                    error.to_string(),
                ))
                .await;
            }
        }
        result
    }

    async fn create_portal(
        &self,
        cmd: &CreatePortalSessionCommand,
    ) -> Result<PortalSession, DomainError> {
        let mapping = self
            .customers
            .find_by_store(cmd.store_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::CustomerNotFound,
                    "Store has no billing customer yet",
                )
            })?;

        self.payment_provider
            .create_portal_session(&mapping.provider_customer_id, &self.return_url)
            .await
            .map_err(|e| DomainError::stripe(e.message))
    }

    async fn audit(&self, entry: CheckoutAuditEntry) {
        let request_id = entry.request_id;
        if let Err(error) = self.audit_log.append(entry).await {
            warn!(%request_id, %error, "failed to append portal audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::SubscriptionStatus;
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::ports::{
        CheckoutSession, CheckoutSessionRequest, CustomerMapping, PaymentError, PriceInfo,
        ProviderCustomer, ProviderSubscription, Store,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockStoreRepo {
        store: Option<Store>,
    }

    #[async_trait]
    impl StoreRepository for MockStoreRepo {
        async fn find_by_id(&self, store_id: StoreId) -> Result<Option<Store>, DomainError> {
            Ok(self.store.clone().filter(|s| s.id == store_id))
        }

        async fn update_subscription_status(
            &self,
            _store_id: StoreId,
            _status: SubscriptionStatus,
        ) -> Result<(), DomainError> {
            Ok(())
        }
    }

    struct MockCustomerRepo {
        mapping: Option<CustomerMapping>,
    }

    #[async_trait]
    impl CustomerRepository for MockCustomerRepo {
        async fn find_by_store(
            &self,
            _store_id: StoreId,
        ) -> Result<Option<CustomerMapping>, DomainError> {
            Ok(self.mapping.clone())
        }

        async fn find_by_provider_customer(
            &self,
            _provider_customer_id: &str,
        ) -> Result<Option<CustomerMapping>, DomainError> {
            Ok(None)
        }

        async fn upsert(&self, _mapping: CustomerMapping) -> Result<(), DomainError> {
            Ok(())
        }
    }

    struct MockPaymentProvider {
        portal_customers: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PaymentProvider for MockPaymentProvider {
        async fn get_price(&self, _price_id: &str) -> Result<Option<PriceInfo>, PaymentError> {
            Ok(None)
        }

        async fn get_customer(
            &self,
            _customer_id: &str,
        ) -> Result<Option<ProviderCustomer>, PaymentError> {
            Ok(None)
        }

        async fn create_customer(
            &self,
            _email: &str,
            _store_id: StoreId,
        ) -> Result<ProviderCustomer, PaymentError> {
            Err(PaymentError::not_found("not used"))
        }

        async fn get_subscription(
            &self,
            _subscription_id: &str,
        ) -> Result<ProviderSubscription, PaymentError> {
            Err(PaymentError::not_found("not used"))
        }

        async fn create_checkout_session(
            &self,
            _request: CheckoutSessionRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            Err(PaymentError::not_found("not used"))
        }

        async fn create_portal_session(
            &self,
            customer_id: &str,
            _return_url: &str,
        ) -> Result<PortalSession, PaymentError> {
            self.portal_customers
                .lock()
                .unwrap()
                .push(customer_id.to_string());
            Ok(PortalSession {
                id: "ps_123".to_string(),
                url: "https://billing.stripe.com/ps_123".to_string(),
            })
        }
    }

    struct NoopAuditLog;

    #[async_trait]
    impl CheckoutAuditLog for NoopAuditLog {
        async fn append(&self, _entry: CheckoutAuditEntry) -> Result<(), DomainError> {
            Ok(())
        }
    }

    fn owner() -> AuthenticatedUser {
        AuthenticatedUser::new(
            UserId::new("owner-1").unwrap(),
            "owner@example.com",
            None,
            true,
        )
    }

    fn handler_with(
        store_id: StoreId,
        mapping: Option<CustomerMapping>,
    ) -> (CreatePortalSessionHandler, Arc<MockPaymentProvider>) {
        let payment = Arc::new(MockPaymentProvider {
            portal_customers: Mutex::new(Vec::new()),
        });
        let handler = CreatePortalSessionHandler::new(
            Arc::new(MockStoreRepo {
                store: Some(Store {
                    id: store_id,
                    owner_user_id: owner().id,
                    name: "Acme".to_string(),
                    subscription_status: None,
                    created_at: Timestamp::now(),
                }),
            }),
            Arc::new(MockCustomerRepo { mapping }),
            payment.clone(),
            Arc::new(NoopAuditLog),
            "https://app.example.com/billing".to_string(),
        );
        (handler, payment)
    }

    #[tokio::test]
    async fn creates_portal_for_mapped_customer() {
        let store_id = StoreId::new();
        let (handler, payment) = handler_with(
            store_id,
            Some(CustomerMapping {
                store_id,
                provider_customer_id: "cus_1".to_string(),
                email: "owner@example.com".to_string(),
                created_at: Timestamp::now(),
            }),
        );

        let session = handler
            .handle(CreatePortalSessionCommand {
                user: owner(),
                store_id,
                request_id: RequestId::new(),
            })
            .await
            .unwrap();

        assert_eq!(session.id, "ps_123");
        assert_eq!(
            payment.portal_customers.lock().unwrap().as_slice(),
            ["cus_1".to_string()]
        );
    }

    #[tokio::test]
    async fn store_without_customer_is_rejected() {
        let store_id = StoreId::new();
        let (handler, _) = handler_with(store_id, None);

        let error = handler
            .handle(CreatePortalSessionCommand {
                user: owner(),
                store_id,
                request_id: RequestId::new(),
            })
            .await
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::CustomerNotFound);
    }

    #[tokio::test]
    async fn foreign_store_is_not_found() {
        let store_id = StoreId::new();
        let (handler, _) = handler_with(store_id, None);

        let error = handler
            .handle(CreatePortalSessionCommand {
                user: AuthenticatedUser::new(
                    UserId::new("intruder").unwrap(),
                    "x@example.com",
                    None,
                    true,
                ),
                store_id,
                request_id: RequestId::new(),
            })
            .await
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::StoreNotFound);
    }
}
