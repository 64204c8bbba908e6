//! CreateCheckoutSessionHandler - orchestrates the paid-plan checkout flow.
//!
//! The pipeline: authorize the store, verify the price is sellable, resolve
//! or create the provider customer, then branch. Stores that already have an
//! access-granting subscription get a billing portal session to manage it;
//! everything else gets a checkout session. Every request leaves one audit
//! row, `created` or `error`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{
    AuthenticatedUser, DomainError, ErrorCode, RequestId, StoreId, Timestamp,
};
use crate::ports::{
    AuditSessionKind, CheckoutAuditEntry, CheckoutAuditLog, CheckoutSession,
    CheckoutSessionRequest, CustomerMapping, CustomerRepository, PaymentError, PaymentProvider,
    PortalSession, Store, StoreRepository, SubscriptionRepository,
};

/// Redirect URLs handed to the payment provider.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
    pub portal_return_url: String,
}

/// Command to initiate checkout for a store.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub user: AuthenticatedUser,
    pub store_id: StoreId,
    pub price_id: String,
    pub request_id: RequestId,
}

/// The session the caller should be redirected to.
#[derive(Debug, Clone)]
pub enum CheckoutSessionOutcome {
    /// New subscription: provider checkout page.
    Checkout(CheckoutSession),
    /// Already subscribed: provider billing portal.
    Portal(PortalSession),
}

impl CheckoutSessionOutcome {
    /// The redirect URL regardless of branch.
    pub fn url(&self) -> &str {
        match self {
            CheckoutSessionOutcome::Checkout(session) => &session.url,
            CheckoutSessionOutcome::Portal(session) => &session.url,
        }
    }
}

/// Handler for initiating checkout or portal sessions.
pub struct CreateCheckoutSessionHandler {
    stores: Arc<dyn StoreRepository>,
    customers: Arc<dyn CustomerRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    audit_log: Arc<dyn CheckoutAuditLog>,
    urls: CheckoutUrls,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        customers: Arc<dyn CustomerRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        audit_log: Arc<dyn CheckoutAuditLog>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            stores,
            customers,
            subscriptions,
            payment_provider,
            audit_log,
            urls,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CheckoutSessionOutcome, DomainError> {
        // 1. Authorize: the store must exist and belong to the caller.
        //    Both failures surface identically so callers cannot probe
        //    for stores they do not own.
        let store = self.authorize_store(&cmd).await?;

        // From here on every failure leaves an audit row.
        match self.create_session(&cmd, &store).await {
            Ok(outcome) => {
                let (kind, session_id) = match &outcome {
                    CheckoutSessionOutcome::Checkout(s) => {
                        (AuditSessionKind::Checkout, s.id.clone())
                    }
                    CheckoutSessionOutcome::Portal(s) => (AuditSessionKind::Portal, s.id.clone()),
                };
                self.audit(CheckoutAuditEntry::created(
                    cmd.request_id,
                    cmd.store_id,
                    Some(cmd.price_id.clone()),
                    session_id,
                    kind,
                ))
                .await;
                info!(
                    request_id = %cmd.request_id,
                    store_id = %cmd.store_id,
                    kind = kind.as_str(),
                    "billing session created"
                );
                Ok(outcome)
            }
            Err(error) => {
                self.audit(CheckoutAuditEntry::error(
                    cmd.request_id,
                    cmd.store_id,
                    Some(cmd.price_id.clone()),
                    AuditSessionKind::Checkout,
                    error.to_string(),
                ))
                .await;
                Err(error)
            }
        }
    }

    async fn create_session(
        &self,
        cmd: &CreateCheckoutSessionCommand,
        _store: &Store,
    ) -> Result<CheckoutSessionOutcome, DomainError> {
        // 2. The price must exist and be active.
        let price = self
            .payment_provider
            .get_price(&cmd.price_id)
            .await
            .map_err(payment_error)?
            .ok_or_else(|| {
                DomainError::new(ErrorCode::PriceNotFound, "Price not found")
                    .with_detail("price_id", cmd.price_id.clone())
            })?;
        if !price.active {
            return Err(DomainError::validation(
                "price_id",
                "Price is not active for sale",
            ));
        }

        // 3. Resolve or create the provider customer for this store.
        let customer_id = self.resolve_customer(cmd).await?;

        // 4. Already-subscribed stores manage billing through the portal.
        let active = self
            .subscriptions
            .find_active_by_store(cmd.store_id)
            .await?
            .filter(|s| s.grants_access());
        if active.is_some() {
            let portal = self
                .payment_provider
                .create_portal_session(&customer_id, &self.urls.portal_return_url)
                .await
                .map_err(payment_error)?;
            return Ok(CheckoutSessionOutcome::Portal(portal));
        }

        // 5. Create the checkout session. The provider-side idempotency key
        //    collapses rapid duplicate submissions onto one session.
        let idempotency_key = format!(
            "checkout_{}_{}_{}",
            cmd.store_id,
            cmd.price_id,
            Timestamp::now().as_unix_secs()
        );
        let session = self
            .payment_provider
            .create_checkout_session(CheckoutSessionRequest {
                customer_id,
                price_id: cmd.price_id.clone(),
                store_id: cmd.store_id,
                request_id: cmd.request_id,
                idempotency_key,
                success_url: self.urls.success_url.clone(),
                cancel_url: self.urls.cancel_url.clone(),
                allow_promotion_codes: true,
            })
            .await
            .map_err(payment_error)?;

        Ok(CheckoutSessionOutcome::Checkout(session))
    }

    async fn authorize_store(
        &self,
        cmd: &CreateCheckoutSessionCommand,
    ) -> Result<Store, DomainError> {
        let not_found =
            || DomainError::new(ErrorCode::StoreNotFound, "Store not found");

        let store = self
            .stores
            .find_by_id(cmd.store_id)
            .await?
            .ok_or_else(not_found)?;
        if !store.is_owned_by(&cmd.user.id) {
            warn!(
                request_id = %cmd.request_id,
                store_id = %cmd.store_id,
                user_id = %cmd.user.id.as_str(),
                "checkout attempted against store not owned by caller"
            );
            return Err(not_found());
        }
        Ok(store)
    }

    /// Return the provider customer id for this store, creating the
    /// customer (and mapping) when none exists or the provider-side
    /// customer was deleted.
    async fn resolve_customer(
        &self,
        cmd: &CreateCheckoutSessionCommand,
    ) -> Result<String, DomainError> {
        if let Some(mapping) = self.customers.find_by_store(cmd.store_id).await? {
            let exists = self
                .payment_provider
                .get_customer(&mapping.provider_customer_id)
                .await
                .map_err(payment_error)?
                .is_some();
            if exists {
                return Ok(mapping.provider_customer_id);
            }
            warn!(
                store_id = %cmd.store_id,
                customer_id = %mapping.provider_customer_id,
                "mapped provider customer no longer exists, recreating"
            );
        }

        let customer = self
            .payment_provider
            .create_customer(&cmd.user.email, cmd.store_id)
            .await
            .map_err(payment_error)?;
        self.customers
            .upsert(CustomerMapping {
                store_id: cmd.store_id,
                provider_customer_id: customer.id.clone(),
                email: cmd.user.email.clone(),
                created_at: Timestamp::now(),
            })
            .await?;
        Ok(customer.id)
    }

    /// Audit failures never fail the request.
    async fn audit(&self, entry: CheckoutAuditEntry) {
        let request_id = entry.request_id;
        if let Err(error) = self.audit_log.append(entry).await {
            warn!(%request_id, %error, "failed to append checkout audit entry");
        }
    }
}

fn payment_error(error: PaymentError) -> DomainError {
    let mut domain = DomainError::stripe(error.message.clone());
    if let Some(code) = &error.provider_code {
        domain = domain.with_detail("provider_code", code.clone());
    }
    domain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{StoreSubscription, SubscriptionStatus};
    use crate::domain::foundation::UserId;
    use crate::ports::{
        AuditStatus, PaymentErrorCode, PriceInfo, ProviderCustomer, ProviderSubscription,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

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
        mapping: Mutex<Option<CustomerMapping>>,
    }

    impl MockCustomerRepo {
        fn empty() -> Self {
            Self {
                mapping: Mutex::new(None),
            }
        }

        fn with(mapping: CustomerMapping) -> Self {
            Self {
                mapping: Mutex::new(Some(mapping)),
            }
        }
    }

    #[async_trait]
    impl CustomerRepository for MockCustomerRepo {
        async fn find_by_store(
            &self,
            _store_id: StoreId,
        ) -> Result<Option<CustomerMapping>, DomainError> {
            Ok(self.mapping.lock().unwrap().clone())
        }

        async fn find_by_provider_customer(
            &self,
            _provider_customer_id: &str,
        ) -> Result<Option<CustomerMapping>, DomainError> {
            Ok(None)
        }

        async fn upsert(&self, mapping: CustomerMapping) -> Result<(), DomainError> {
            *self.mapping.lock().unwrap() = Some(mapping);
            Ok(())
        }
    }

    struct MockSubscriptionRepo {
        active: Option<StoreSubscription>,
    }

    #[async_trait]
    impl SubscriptionRepository for MockSubscriptionRepo {
        async fn find_by_provider_id(
            &self,
            _provider_subscription_id: &str,
        ) -> Result<Option<StoreSubscription>, DomainError> {
            Ok(None)
        }

        async fn find_active_by_store(
            &self,
            _store_id: StoreId,
        ) -> Result<Option<StoreSubscription>, DomainError> {
            Ok(self.active.clone())
        }

        async fn upsert(&self, _subscription: StoreSubscription) -> Result<(), DomainError> {
            Ok(())
        }

        async fn update(&self, _subscription: StoreSubscription) -> Result<bool, DomainError> {
            Ok(true)
        }
    }

    struct MockPaymentProvider {
        price: Option<PriceInfo>,
        customer_exists: bool,
        fail_checkout: bool,
        checkout_requests: Mutex<Vec<CheckoutSessionRequest>>,
        created_customers: Mutex<Vec<String>>,
    }

    impl MockPaymentProvider {
        fn new() -> Self {
            Self {
                price: Some(PriceInfo {
                    id: "price_123".to_string(),
                    active: true,
                    currency: "brl".to_string(),
                    unit_amount: Some(9900),
                }),
                customer_exists: true,
                fail_checkout: false,
                checkout_requests: Mutex::new(Vec::new()),
                created_customers: Mutex::new(Vec::new()),
            }
        }

        fn without_price() -> Self {
            Self {
                price: None,
                ..Self::new()
            }
        }

        fn inactive_price() -> Self {
            Self {
                price: Some(PriceInfo {
                    id: "price_123".to_string(),
                    active: false,
                    currency: "brl".to_string(),
                    unit_amount: Some(9900),
                }),
                ..Self::new()
            }
        }

        fn failing_checkout() -> Self {
            Self {
                fail_checkout: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPaymentProvider {
        async fn get_price(&self, _price_id: &str) -> Result<Option<PriceInfo>, PaymentError> {
            Ok(self.price.clone())
        }

        async fn get_customer(
            &self,
            customer_id: &str,
        ) -> Result<Option<ProviderCustomer>, PaymentError> {
            if self.customer_exists {
                Ok(Some(ProviderCustomer {
                    id: customer_id.to_string(),
                    email: None,
                }))
            } else {
                Ok(None)
            }
        }

        async fn create_customer(
            &self,
            email: &str,
            _store_id: StoreId,
        ) -> Result<ProviderCustomer, PaymentError> {
            let id = format!("cus_new_{}", self.created_customers.lock().unwrap().len());
            self.created_customers.lock().unwrap().push(id.clone());
            Ok(ProviderCustomer {
                id,
                email: Some(email.to_string()),
            })
        }

        async fn get_subscription(
            &self,
            _subscription_id: &str,
        ) -> Result<ProviderSubscription, PaymentError> {
            Err(PaymentError::not_found("not used"))
        }

        async fn create_checkout_session(
            &self,
            request: CheckoutSessionRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            if self.fail_checkout {
                return Err(PaymentError::new(
                    PaymentErrorCode::ProviderUnavailable,
                    "Stripe is down",
                ));
            }
            self.checkout_requests.lock().unwrap().push(request);
            Ok(CheckoutSession {
                id: "cs_123".to_string(),
                url: "https://checkout.stripe.com/cs_123".to_string(),
            })
        }

        async fn create_portal_session(
            &self,
            _customer_id: &str,
            _return_url: &str,
        ) -> Result<PortalSession, PaymentError> {
            Ok(PortalSession {
                id: "ps_123".to_string(),
                url: "https://billing.stripe.com/ps_123".to_string(),
            })
        }
    }

    struct MockAuditLog {
        entries: Mutex<Vec<CheckoutAuditEntry>>,
    }

    impl MockAuditLog {
        fn new() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
            }
        }

        fn entries(&self) -> Vec<CheckoutAuditEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CheckoutAuditLog for MockAuditLog {
        async fn append(&self, entry: CheckoutAuditEntry) -> Result<(), DomainError> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn test_urls() -> CheckoutUrls {
        CheckoutUrls {
            success_url: "https://app.example.com/billing/success".to_string(),
            cancel_url: "https://app.example.com/billing/cancel".to_string(),
            portal_return_url: "https://app.example.com/billing".to_string(),
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

    fn store_owned_by(user: &AuthenticatedUser, store_id: StoreId) -> Store {
        Store {
            id: store_id,
            owner_user_id: user.id.clone(),
            name: "Acme".to_string(),
            subscription_status: None,
            created_at: Timestamp::now(),
        }
    }

    fn command(store_id: StoreId) -> CreateCheckoutSessionCommand {
        CreateCheckoutSessionCommand {
            user: owner(),
            store_id,
            price_id: "price_123".to_string(),
            request_id: RequestId::new(),
        }
    }

    fn active_subscription(store_id: StoreId) -> StoreSubscription {
        StoreSubscription::new(
            "sub_1",
            store_id,
            "cus_1",
            "price_123",
            SubscriptionStatus::Active,
        )
    }

    struct Fixture {
        store_id: StoreId,
        customers: Arc<MockCustomerRepo>,
        payment: Arc<MockPaymentProvider>,
        audit: Arc<MockAuditLog>,
        handler: CreateCheckoutSessionHandler,
    }

    fn fixture(
        payment: MockPaymentProvider,
        customers: MockCustomerRepo,
        active: Option<StoreSubscription>,
    ) -> Fixture {
        let store_id = StoreId::new();
        let customers = Arc::new(customers);
        let payment = Arc::new(payment);
        let audit = Arc::new(MockAuditLog::new());
        let handler = CreateCheckoutSessionHandler::new(
            Arc::new(MockStoreRepo {
                store: Some(store_owned_by(&owner(), store_id)),
            }),
            customers.clone(),
            Arc::new(MockSubscriptionRepo { active }),
            payment.clone(),
            audit.clone(),
            test_urls(),
        );
        Fixture {
            store_id,
            customers,
            payment,
            audit,
            handler,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Paths
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_checkout_session_for_new_subscriber() {
        let f = fixture(MockPaymentProvider::new(), MockCustomerRepo::empty(), None);

        let outcome = f.handler.handle(command(f.store_id)).await.unwrap();

        assert!(matches!(outcome, CheckoutSessionOutcome::Checkout(_)));
        assert!(outcome.url().contains("checkout.stripe.com"));

        let requests = f.payment.checkout_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].allow_promotion_codes);
        assert!(requests[0]
            .idempotency_key
            .starts_with(&format!("checkout_{}_price_123_", f.store_id)));
    }

    #[tokio::test]
    async fn returns_portal_session_when_already_subscribed() {
        let store_id = StoreId::new();
        let f = fixture(
            MockPaymentProvider::new(),
            MockCustomerRepo::with(CustomerMapping {
                store_id,
                provider_customer_id: "cus_existing".to_string(),
                email: "owner@example.com".to_string(),
                created_at: Timestamp::now(),
            }),
            Some(active_subscription(store_id)),
        );

        let outcome = f.handler.handle(command(f.store_id)).await.unwrap();

        assert!(matches!(outcome, CheckoutSessionOutcome::Portal(_)));
        assert!(f.payment.checkout_requests.lock().unwrap().is_empty());

        let entries = f.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, AuditSessionKind::Portal);
        assert_eq!(entries[0].status, AuditStatus::Created);
    }

    #[tokio::test]
    async fn creates_customer_and_mapping_when_none_exists() {
        let f = fixture(MockPaymentProvider::new(), MockCustomerRepo::empty(), None);

        f.handler.handle(command(f.store_id)).await.unwrap();

        assert_eq!(f.payment.created_customers.lock().unwrap().len(), 1);
        let mapping = f.customers.mapping.lock().unwrap().clone().unwrap();
        assert_eq!(mapping.email, "owner@example.com");
    }

    #[tokio::test]
    async fn reuses_existing_customer_mapping() {
        let store_id = StoreId::new();
        let f = fixture(
            MockPaymentProvider::new(),
            MockCustomerRepo::with(CustomerMapping {
                store_id,
                provider_customer_id: "cus_existing".to_string(),
                email: "owner@example.com".to_string(),
                created_at: Timestamp::now(),
            }),
            None,
        );

        f.handler.handle(command(f.store_id)).await.unwrap();

        assert!(f.payment.created_customers.lock().unwrap().is_empty());
        let requests = f.payment.checkout_requests.lock().unwrap();
        assert_eq!(requests[0].customer_id, "cus_existing");
    }

    #[tokio::test]
    async fn recreates_customer_when_provider_side_is_gone() {
        let store_id = StoreId::new();
        let payment = MockPaymentProvider {
            customer_exists: false,
            ..MockPaymentProvider::new()
        };
        let f = fixture(
            payment,
            MockCustomerRepo::with(CustomerMapping {
                store_id,
                provider_customer_id: "cus_deleted".to_string(),
                email: "owner@example.com".to_string(),
                created_at: Timestamp::now(),
            }),
            None,
        );

        f.handler.handle(command(f.store_id)).await.unwrap();

        assert_eq!(f.payment.created_customers.lock().unwrap().len(), 1);
        let mapping = f.customers.mapping.lock().unwrap().clone().unwrap();
        assert_ne!(mapping.provider_customer_id, "cus_deleted");
    }

    #[tokio::test]
    async fn audits_successful_checkout() {
        let f = fixture(MockPaymentProvider::new(), MockCustomerRepo::empty(), None);
        let cmd = command(f.store_id);
        let request_id = cmd.request_id;

        f.handler.handle(cmd).await.unwrap();

        let entries = f.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_id, request_id);
        assert_eq!(entries[0].status, AuditStatus::Created);
        assert_eq!(entries[0].session_id.as_deref(), Some("cs_123"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Paths
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_store_is_not_found() {
        let f = fixture(MockPaymentProvider::new(), MockCustomerRepo::empty(), None);

        let result = f.handler.handle(command(StoreId::new())).await;

        let error = result.unwrap_err();
        assert_eq!(error.code, ErrorCode::StoreNotFound);
        // Authorization failures leave no audit row.
        assert!(f.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn foreign_store_looks_identical_to_missing_store() {
        let f = fixture(MockPaymentProvider::new(), MockCustomerRepo::empty(), None);

        let mut cmd = command(f.store_id);
        cmd.user = AuthenticatedUser::new(
            UserId::new("intruder").unwrap(),
            "intruder@example.com",
            None,
            true,
        );

        let error = f.handler.handle(cmd).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::StoreNotFound);
        assert_eq!(error.message, "Store not found");
    }

    #[tokio::test]
    async fn missing_price_is_rejected() {
        let f = fixture(
            MockPaymentProvider::without_price(),
            MockCustomerRepo::empty(),
            None,
        );

        let error = f.handler.handle(command(f.store_id)).await.unwrap_err();

        assert_eq!(error.code, ErrorCode::PriceNotFound);
        let entries = f.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AuditStatus::Error);
    }

    #[tokio::test]
    async fn inactive_price_is_rejected() {
        let f = fixture(
            MockPaymentProvider::inactive_price(),
            MockCustomerRepo::empty(),
            None,
        );

        let error = f.handler.handle(command(f.store_id)).await.unwrap_err();

        assert_eq!(error.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_stripe_error_and_audits() {
        let f = fixture(
            MockPaymentProvider::failing_checkout(),
            MockCustomerRepo::empty(),
            None,
        );

        let error = f.handler.handle(command(f.store_id)).await.unwrap_err();

        assert_eq!(error.code, ErrorCode::StripeError);
        let entries = f.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AuditStatus::Error);
        assert!(entries[0]
            .error_message
            .as_deref()
            .unwrap_or("")
            .contains("Stripe is down"));
    }
}
