//! Session validation port for JWT token validation.
//!
//! This port defines the contract for validating access tokens and extracting
//! user identity. It is provider-agnostic; implementations exist for JWKS-based
//! OIDC providers and mock testing.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// This is the primary port for authentication. HTTP handlers use this to
/// validate Bearer tokens before any billing operation runs.
///
/// # Contract
///
/// Implementations must:
/// - Validate the token signature
/// - Validate issuer, audience, and expiry claims
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a JWT access token and return the authenticated user.
    ///
    /// `token` is the raw JWT without the "Bearer " prefix.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
