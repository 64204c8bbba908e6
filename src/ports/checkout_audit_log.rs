//! CheckoutAuditLog port - append-only record of checkout attempts.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RequestId, StoreId, Timestamp};

/// What kind of session the request produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSessionKind {
    Checkout,
    Portal,
}

impl AuditSessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSessionKind::Checkout => "checkout",
            AuditSessionKind::Portal => "portal",
        }
    }
}

/// Terminal outcome of the checkout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Created,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Created => "created",
            AuditStatus::Error => "error",
        }
    }
}

/// One audit row per checkout/portal request.
#[derive(Debug, Clone)]
pub struct CheckoutAuditEntry {
    pub request_id: RequestId,
    pub store_id: StoreId,
    pub price_id: Option<String>,
    /// Provider session id when one was created.
    pub session_id: Option<String>,
    pub kind: AuditSessionKind,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

impl CheckoutAuditEntry {
    /// A successful session creation.
    pub fn created(
        request_id: RequestId,
        store_id: StoreId,
        price_id: Option<String>,
        session_id: String,
        kind: AuditSessionKind,
    ) -> Self {
        Self {
            request_id,
            store_id,
            price_id,
            session_id: Some(session_id),
            kind,
            status: AuditStatus::Created,
            error_message: None,
            created_at: Timestamp::now(),
        }
    }

    /// A failed attempt; records the error message for diagnosis.
    pub fn error(
        request_id: RequestId,
        store_id: StoreId,
        price_id: Option<String>,
        kind: AuditSessionKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            store_id,
            price_id,
            session_id: None,
            kind,
            status: AuditStatus::Error,
            error_message: Some(message.into()),
            created_at: Timestamp::now(),
        }
    }
}

/// Port for the append-only checkout audit log.
#[async_trait]
pub trait CheckoutAuditLog: Send + Sync {
    /// Append an entry. Audit failures must not fail the request;
    /// callers log and continue.
    async fn append(&self, entry: CheckoutAuditEntry) -> Result<(), DomainError>;
}
