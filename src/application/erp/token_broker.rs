//! TokenBroker - per-store Tiny access tokens with proactive refresh.
//!
//! `get_valid_token` returns a credential whose access token has at least
//! the safety margin of lifetime left, refreshing through the ERP gateway
//! when it does not. Concurrent callers for the same store coalesce onto a
//! single refresh; each store has its own refresh lock so one store's slow
//! refresh never blocks another's.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::erp::TinyCredential;
use crate::domain::foundation::{ErrorCode, StoreId, Timestamp};
use crate::ports::{ErpCredentialRepository, ErpError, ErpGateway};

/// Errors surfaced by the token broker.
#[derive(Debug, thiserror::Error)]
pub enum TokenBrokerError {
    /// The store has no stored ERP credential.
    #[error("no ERP integration connected for store {0}")]
    IntegrationNotFound(StoreId),

    /// Refresh failed at the ERP; the stored refresh token may be revoked.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] ErpError),

    /// Credential persistence failed.
    #[error("credential store error: {0}")]
    Store(crate::domain::foundation::DomainError),
}

impl TokenBrokerError {
    /// The public error code for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            TokenBrokerError::IntegrationNotFound(_) => ErrorCode::IntegrationNotFound,
            TokenBrokerError::RefreshFailed(_) => ErrorCode::ErpError,
            TokenBrokerError::Store(_) => ErrorCode::DatabaseError,
        }
    }
}

/// Broker that keeps per-store ERP access tokens fresh.
pub struct TokenBroker {
    credentials: Arc<dyn ErpCredentialRepository>,
    gateway: Arc<dyn ErpGateway>,
    /// Per-store refresh locks; concurrent refreshes coalesce here.
    refresh_locks: Mutex<HashMap<StoreId, Arc<Mutex<()>>>>,
}

impl TokenBroker {
    pub fn new(
        credentials: Arc<dyn ErpCredentialRepository>,
        gateway: Arc<dyn ErpGateway>,
    ) -> Self {
        Self {
            credentials,
            gateway,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return a credential valid for at least the safety margin.
    ///
    /// Refreshes and persists the credential when it is inside the margin.
    /// While a refresh for a store is in flight, other callers for the same
    /// store wait for it and then reuse the refreshed credential instead of
    /// issuing their own refresh.
    pub async fn get_valid_token(
        &self,
        store_id: StoreId,
    ) -> Result<TinyCredential, TokenBrokerError> {
        let credential = self.load(store_id).await?;
        if !credential.needs_refresh(Timestamp::now()) {
            return Ok(credential);
        }

        let lock = self.lock_for(store_id).await;
        let result = async {
            let _guard = lock.lock().await;

            // Re-check under the lock: a coalesced refresh may have already
            // stored a fresh credential while we waited.
            let credential = self.load(store_id).await?;
            if !credential.needs_refresh(Timestamp::now()) {
                debug!(%store_id, "reusing credential refreshed by concurrent caller");
                return Ok(credential);
            }

            self.refresh_and_store(credential).await
        }
        .await;
        self.drop_idle_lock(store_id, lock).await;
        result
    }

    /// Exchange an OAuth authorization code and persist the credential.
    pub async fn connect(
        &self,
        store_id: StoreId,
        code: &str,
    ) -> Result<TinyCredential, TokenBrokerError> {
        let grant = self.gateway.exchange_code(code).await?;
        let credential = TinyCredential {
            store_id,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: Timestamp::now().plus_secs(grant.expires_in),
            updated_at: Timestamp::now(),
        };
        self.credentials
            .upsert(credential.clone())
            .await
            .map_err(TokenBrokerError::Store)?;
        info!(%store_id, "ERP integration connected");
        Ok(credential)
    }

    async fn load(&self, store_id: StoreId) -> Result<TinyCredential, TokenBrokerError> {
        self.credentials
            .find_by_store(store_id)
            .await
            .map_err(TokenBrokerError::Store)?
            .ok_or(TokenBrokerError::IntegrationNotFound(store_id))
    }

    async fn refresh_and_store(
        &self,
        credential: TinyCredential,
    ) -> Result<TinyCredential, TokenBrokerError> {
        let store_id = credential.store_id;
        let grant = match self.gateway.refresh(&credential.refresh_token).await {
            Ok(grant) => grant,
            Err(error) => {
                warn!(%store_id, %error, "ERP token refresh failed");
                return Err(error.into());
            }
        };

        let refreshed = TinyCredential {
            store_id,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: Timestamp::now().plus_secs(grant.expires_in),
            updated_at: Timestamp::now(),
        };
        self.credentials
            .upsert(refreshed.clone())
            .await
            .map_err(TokenBrokerError::Store)?;
        debug!(%store_id, "ERP access token refreshed");
        Ok(refreshed)
    }

    async fn lock_for(&self, store_id: StoreId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(store_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Remove a store's lock entry once no caller holds a clone of it.
    ///
    /// Clones are only handed out under the map lock, so a strong count of
    /// one here means the map holds the last reference.
    async fn drop_idle_lock(&self, store_id: StoreId, lock: Arc<Mutex<()>>) {
        let mut locks = self.refresh_locks.lock().await;
        drop(lock);
        if let Some(entry) = locks.get(&store_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&store_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::DomainError;
    use crate::ports::{ErpApiRequest, ErpApiResponse, TokenGrant};
    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mocks
    // ════════════════════════════════════════════════════════════════════════════

    struct MockCredentialRepo {
        credential: StdMutex<Option<TinyCredential>>,
    }

    impl MockCredentialRepo {
        fn empty() -> Self {
            Self {
                credential: StdMutex::new(None),
            }
        }

        fn with(credential: TinyCredential) -> Self {
            Self {
                credential: StdMutex::new(Some(credential)),
            }
        }
    }

    #[async_trait]
    impl ErpCredentialRepository for MockCredentialRepo {
        async fn find_by_store(
            &self,
            _store_id: StoreId,
        ) -> Result<Option<TinyCredential>, DomainError> {
            Ok(self.credential.lock().unwrap().clone())
        }

        async fn upsert(&self, credential: TinyCredential) -> Result<(), DomainError> {
            *self.credential.lock().unwrap() = Some(credential);
            Ok(())
        }

        async fn delete(&self, _store_id: StoreId) -> Result<(), DomainError> {
            *self.credential.lock().unwrap() = None;
            Ok(())
        }
    }

    struct MockGateway {
        refresh_calls: AtomicU32,
        refresh_delay_ms: u64,
        fail_refresh: bool,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                refresh_calls: AtomicU32::new(0),
                refresh_delay_ms: 0,
                fail_refresh: false,
            }
        }

        fn slow() -> Self {
            Self {
                refresh_delay_ms: 50,
                ..Self::new()
            }
        }

        fn failing() -> Self {
            Self {
                fail_refresh: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ErpGateway for MockGateway {
        async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ErpError> {
            Ok(TokenGrant {
                access_token: SecretString::new(format!("access-for-{code}")),
                refresh_token: SecretString::new("refresh-new".to_string()),
                expires_in: 14400,
            })
        }

        async fn refresh(&self, _refresh_token: &SecretString) -> Result<TokenGrant, ErpError> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.refresh_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.refresh_delay_ms)).await;
            }
            if self.fail_refresh {
                return Err(ErpError::RefreshTokenExpired);
            }
            Ok(TokenGrant {
                access_token: SecretString::new(format!("refreshed-{n}")),
                refresh_token: SecretString::new(format!("refresh-{n}")),
                expires_in: 14400,
            })
        }

        async fn call(
            &self,
            _request: ErpApiRequest,
            _bearer_token: &SecretString,
        ) -> Result<ErpApiResponse, ErpError> {
            unreachable!("not used by the broker")
        }
    }

    fn credential_expiring_in(store_id: StoreId, secs: u64) -> TinyCredential {
        TinyCredential::new(
            store_id,
            "stored-access",
            "stored-refresh",
            Timestamp::now().plus_secs(secs),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn missing_credential_is_integration_not_found() {
        let broker = TokenBroker::new(
            Arc::new(MockCredentialRepo::empty()),
            Arc::new(MockGateway::new()),
        );

        let result = broker.get_valid_token(StoreId::new()).await;

        assert!(matches!(
            result,
            Err(TokenBrokerError::IntegrationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let store_id = StoreId::new();
        let gateway = Arc::new(MockGateway::new());
        let broker = TokenBroker::new(
            Arc::new(MockCredentialRepo::with(credential_expiring_in(
                store_id, 360,
            ))),
            gateway.clone(),
        );

        let credential = broker.get_valid_token(store_id).await.unwrap();

        assert_eq!(credential.bearer_token(), "stored-access");
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_inside_margin_is_refreshed_and_persisted() {
        let store_id = StoreId::new();
        let repo = Arc::new(MockCredentialRepo::with(credential_expiring_in(
            store_id, 240,
        )));
        let gateway = Arc::new(MockGateway::new());
        let broker = TokenBroker::new(repo.clone(), gateway.clone());

        let credential = broker.get_valid_token(store_id).await.unwrap();

        assert_eq!(credential.bearer_token(), "refreshed-1");
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);

        let stored = repo.credential.lock().unwrap().clone().unwrap();
        assert_eq!(stored.access_token.expose_secret(), "refreshed-1");
        assert_eq!(stored.refresh_token.expose_secret(), "refresh-1");
    }

    #[tokio::test]
    async fn concurrent_callers_coalesce_onto_one_refresh() {
        let store_id = StoreId::new();
        let repo = Arc::new(MockCredentialRepo::with(credential_expiring_in(
            store_id, 60,
        )));
        let gateway = Arc::new(MockGateway::slow());
        let broker = Arc::new(TokenBroker::new(repo, gateway.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let broker = broker.clone();
            handles.push(tokio::spawn(
                async move { broker.get_valid_token(store_id).await },
            ));
        }

        for handle in handles {
            let credential = handle.await.unwrap().unwrap();
            assert_eq!(credential.bearer_token(), "refreshed-1");
        }
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(broker.refresh_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_lock_is_dropped_when_idle() {
        let store_id = StoreId::new();
        let broker = TokenBroker::new(
            Arc::new(MockCredentialRepo::with(credential_expiring_in(
                store_id, 240,
            ))),
            Arc::new(MockGateway::new()),
        );

        broker.get_valid_token(store_id).await.unwrap();

        assert!(broker.refresh_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_failure_propagates() {
        let store_id = StoreId::new();
        let broker = TokenBroker::new(
            Arc::new(MockCredentialRepo::with(credential_expiring_in(
                store_id, 60,
            ))),
            Arc::new(MockGateway::failing()),
        );

        let result = broker.get_valid_token(store_id).await;

        assert!(matches!(
            result,
            Err(TokenBrokerError::RefreshFailed(ErpError::RefreshTokenExpired))
        ));
    }

    #[tokio::test]
    async fn connect_exchanges_code_and_persists() {
        let store_id = StoreId::new();
        let repo = Arc::new(MockCredentialRepo::empty());
        let broker = TokenBroker::new(repo.clone(), Arc::new(MockGateway::new()));

        let credential = broker.connect(store_id, "auth-code-1").await.unwrap();

        assert_eq!(credential.bearer_token(), "access-for-auth-code-1");
        assert!(repo.credential.lock().unwrap().is_some());
    }

    #[test]
    fn error_codes_map_to_public_taxonomy() {
        let not_found = TokenBrokerError::IntegrationNotFound(StoreId::new());
        assert_eq!(not_found.error_code(), ErrorCode::IntegrationNotFound);

        let refresh = TokenBrokerError::RefreshFailed(ErpError::RefreshTokenExpired);
        assert_eq!(refresh.error_code(), ErrorCode::ErpError);
    }
}
