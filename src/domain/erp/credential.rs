//! Tiny ERP OAuth credential.

use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{StoreId, Timestamp};

/// How much remaining lifetime a token needs to be considered usable.
///
/// Tokens inside this margin are refreshed proactively so an outbound call
/// never races token expiry mid-flight.
pub const EXPIRY_MARGIN_SECS: u64 = 300;

/// Stored OAuth credential for a store's Tiny integration.
#[derive(Clone)]
pub struct TinyCredential {
    pub store_id: StoreId,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TinyCredential {
    pub fn new(
        store_id: StoreId,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            store_id,
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            expires_at,
            updated_at: Timestamp::now(),
        }
    }

    /// True when the access token has less than the safety margin remaining.
    pub fn needs_refresh(&self, now: Timestamp) -> bool {
        self.expires_at
            .duration_since(&now)
            .num_seconds()
            <= EXPIRY_MARGIN_SECS as i64
    }

    /// Exposes the access token for an outbound request.
    pub fn bearer_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

impl std::fmt::Debug for TinyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TinyCredential")
            .field("store_id", &self.store_id)
            .field("expires_at", &self.expires_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}
