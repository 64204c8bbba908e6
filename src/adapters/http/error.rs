//! HTTP error envelope for the billing and ERP endpoints.
//!
//! Every failed request answers with the same JSON shape:
//!
//! ```json
//! { "error": "...", "code": "AUTH_ERROR", "details": {...}, "requestId": "..." }
//! ```
//!
//! `code` is always one of the public taxonomy codes; internal refinements
//! collapse via [`ErrorCode::public_code`]. Notably a store the caller does
//! not own answers 404 with code `AUTH_ERROR`, indistinguishable from a store
//! that does not exist.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, RequestId};

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub request_id: String,
}

/// A domain error tagged with the request it failed.
#[derive(Debug)]
pub struct ApiError {
    error: DomainError,
    request_id: RequestId,
}

impl ApiError {
    pub fn new(error: DomainError, request_id: RequestId) -> Self {
        Self { error, request_id }
    }

    /// Shorthand for request body validation failures.
    pub fn validation(
        field: &str,
        message: impl Into<String>,
        request_id: RequestId,
    ) -> Self {
        Self::new(DomainError::validation(field, message), request_id)
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }

    fn status(&self) -> StatusCode {
        match self.error.code {
            ErrorCode::AuthError => StatusCode::UNAUTHORIZED,
            // Existence is hidden: unauthorized store access and missing
            // stores both answer 404.
            ErrorCode::StoreNotFound | ErrorCode::IntegrationNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError
            | ErrorCode::SubscriptionNotFound
            | ErrorCode::CustomerNotFound
            | ErrorCode::PriceNotFound => StatusCode::BAD_REQUEST,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::StripeError | ErrorCode::ErpError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError | ErrorCode::UnknownError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let details = if self.error.details.is_empty() {
            None
        } else {
            serde_json::to_value(&self.error.details).ok()
        };
        let body = ErrorResponse {
            error: self.error.message.clone(),
            code: self.error.code.public_code().to_string(),
            details,
            request_id: self.request_id.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: DomainError) -> (StatusCode, ErrorResponse) {
        let api = ApiError::new(error, RequestId::new());
        let status = api.status();
        let response = api.into_response();
        assert_eq!(response.status(), status);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn store_not_found_hides_existence_behind_auth_error() {
        let (status, body) =
            body_of(DomainError::new(ErrorCode::StoreNotFound, "Store not found")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "AUTH_ERROR");
        assert_eq!(body.error, "Store not found");
    }

    #[tokio::test]
    async fn validation_error_carries_field_detail() {
        let (status, body) =
            body_of(DomainError::validation("priceId", "priceId is required")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        let details = body.details.unwrap();
        assert_eq!(details["field"], "priceId");
    }

    #[tokio::test]
    async fn database_error_is_internal() {
        let (status, body) = body_of(DomainError::database("pool exhausted")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn missing_integration_is_not_found_with_validation_code() {
        let (status, body) = body_of(DomainError::new(
            ErrorCode::IntegrationNotFound,
            "No ERP integration connected",
        ))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn every_response_carries_a_request_id() {
        let (_, body) = body_of(DomainError::stripe("provider down")).await;
        assert!(!body.request_id.is_empty());
    }
}
