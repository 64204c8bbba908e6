//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' exceeds maximum length {max}")]
    TooLong { field: String, max: usize },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates a too-long validation error.
    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        ValidationError::TooLong {
            field: field.into(),
            max,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes surfaced through API responses and logs.
///
/// The first five form the public error taxonomy of the billing endpoints;
/// the rest are internal refinements that map onto it at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Public billing taxonomy
    AuthError,
    ValidationError,
    StripeError,
    DatabaseError,
    UnknownError,

    // Internal refinements
    StoreNotFound,
    SubscriptionNotFound,
    CustomerNotFound,
    PriceNotFound,
    IntegrationNotFound,
    RateLimited,
    ErpError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::StripeError => "STRIPE_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::StoreNotFound => "STORE_NOT_FOUND",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ErrorCode::PriceNotFound => "PRICE_NOT_FOUND",
            ErrorCode::IntegrationNotFound => "INTEGRATION_NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ErpError => "ERP_ERROR",
        };
        write!(f, "{}", s)
    }
}

impl ErrorCode {
    /// Collapses internal refinements onto the public taxonomy.
    pub fn public_code(&self) -> ErrorCode {
        match self {
            ErrorCode::StoreNotFound => ErrorCode::AuthError,
            ErrorCode::SubscriptionNotFound
            | ErrorCode::CustomerNotFound
            | ErrorCode::PriceNotFound
            | ErrorCode::IntegrationNotFound => ErrorCode::ValidationError,
            ErrorCode::ErpError => ErrorCode::UnknownError,
            other => *other,
        }
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message).with_detail("field", field.into())
    }

    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Creates a payment provider error.
    pub fn stripe(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StripeError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}
