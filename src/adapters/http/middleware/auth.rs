//! Bearer-token authentication middleware and extractors.
//!
//! The middleware validates `Authorization: Bearer <jwt>` when present and
//! stores the resulting [`AuthenticatedUser`] in request extensions. Requests
//! without a token pass through untouched; handlers that need a user enforce
//! it with the [`RequireAuth`] extractor. This keeps unauthenticated routes
//! (the Stripe webhook) on the same router without a second middleware stack.
//!
//! A present-but-invalid token is rejected here with 401 so handlers never
//! see a half-authenticated request.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::debug;

use crate::domain::foundation::{AuthenticatedUser, RequestId};
use crate::ports::SessionValidator;

/// Shared state for the auth middleware.
pub type AuthState = Arc<dyn SessionValidator>;

/// Validates the bearer token if one is present.
pub async fn auth_middleware(
    State(validator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    if let Some(token) = token {
        match validator.validate(&token).await {
            Ok(user) => {
                debug!(user_id = %user.id.as_str(), "request authenticated");
                request.extensions_mut().insert(user);
            }
            Err(error) => {
                debug!(%error, "bearer token rejected");
                return auth_error_response(error.to_string());
            }
        }
    }

    next.run(request).await
}

fn auth_error_response(message: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": message,
            "code": "AUTH_ERROR",
            "requestId": RequestId::new().to_string(),
        })),
    )
        .into_response()
}

/// Extractor that requires an authenticated user.
///
/// Fails with 401 when the auth middleware did not attach a user, i.e. the
/// request carried no token or the middleware is missing from the stack.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'a, 'b, 'c>(
        parts: &'a mut Parts,
        _state: &'b S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'c>,
    >
    where
        'a: 'c,
        'b: 'c,
        Self: 'c,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .cloned()
                .map(RequireAuth)
                .ok_or(AuthRejection)
        })
    }
}

/// Rejection for [`RequireAuth`]: the request carried no valid token.
#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        auth_error_response("Authentication required".to_string())
    }
}
