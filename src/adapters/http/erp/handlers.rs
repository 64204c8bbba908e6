//! HTTP handlers for the Tiny ERP integration endpoints.
//!
//! `tiny-token-exchange` connects a store to Tiny by exchanging the OAuth
//! authorization code; it carries its own per-IP rate limit because the code
//! arrives on a public redirect. `tiny-api` proxies authenticated calls to
//! the Tiny API through the token broker and the per-store call queue.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use tracing::info;

use crate::application::erp::{CallQueue, TokenBroker, TokenBrokerError};
use crate::domain::foundation::{DomainError, ErrorCode, RequestId, StoreId, UserId};
use crate::ports::{ErpApiRequest, ErpGateway, ErpMethod, RateLimiter, StoreRepository};

use super::dto::{TinyApiProxyRequest, TokenExchangeRequest, TokenExchangeResponse};
use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::{client_ip, RateLimitCheck, RequireAuth};
use crate::adapters::rate_limiter::TOKEN_EXCHANGE_RESOURCE;

/// Shared state for the ERP endpoints.
#[derive(Clone)]
pub struct ErpAppState {
    pub stores: Arc<dyn StoreRepository>,
    pub broker: Arc<TokenBroker>,
    pub queue: Arc<CallQueue>,
    pub gateway: Arc<dyn ErpGateway>,
    pub limiter: Arc<dyn RateLimiter>,
}

/// `POST /api/erp/tiny-token-exchange`
pub async fn tiny_token_exchange(
    State(state): State<ErpAppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    RequireAuth(user): RequireAuth,
    Json(body): Json<TokenExchangeRequest>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::new();

    let ip = client_ip(&headers, connect_info.as_ref());
    if let Err(denied) =
        RateLimitCheck::check_resource(state.limiter.as_ref(), &ip, TOKEN_EXCHANGE_RESOURCE).await
    {
        return Ok(denied);
    }

    let store_id = parse_store_id(body.store_id, request_id)?;
    let code = body
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::validation("code", "code is required", request_id))?;

    authorize_store(&state, &user.id, store_id, request_id).await?;

    let credential = state
        .broker
        .connect(store_id, &code)
        .await
        .map_err(|error| broker_error(error, request_id))?;

    info!(%request_id, %store_id, "Tiny integration connected");
    Ok((
        StatusCode::OK,
        Json(TokenExchangeResponse {
            store_id: store_id.to_string(),
            connected: true,
            expires_at: credential.expires_at.as_datetime().to_rfc3339(),
        }),
    )
        .into_response())
}

/// `GET /api/erp/tiny-api`
///
/// `storeId` and `path` are consumed from the query string; every other
/// parameter is forwarded to Tiny verbatim.
pub async fn tiny_api_get(
    State(state): State<ErpAppState>,
    RequireAuth(user): RequireAuth,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::new();

    let store_id = parse_store_id(params.remove("storeId"), request_id)?;
    let path = parse_path(params.remove("path"), request_id)?;
    let query = params.into_iter().collect();

    proxy(
        &state,
        &user.id,
        store_id,
        ErpApiRequest {
            method: ErpMethod::Get,
            path,
            query,
            body: None,
        },
        request_id,
    )
    .await
}

/// `POST /api/erp/tiny-api`
pub async fn tiny_api_post(
    State(state): State<ErpAppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<TinyApiProxyRequest>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::new();

    let store_id = parse_store_id(body.store_id, request_id)?;
    let path = parse_path(body.path, request_id)?;
    let query = body.query.into_iter().collect();

    proxy(
        &state,
        &user.id,
        store_id,
        ErpApiRequest {
            method: ErpMethod::Post,
            path,
            query,
            body: body.body,
        },
        request_id,
    )
    .await
}

/// Fetch a valid token, then run the call through the per-store queue so
/// Tiny never sees two concurrent requests for one account.
async fn proxy(
    state: &ErpAppState,
    user_id: &UserId,
    store_id: StoreId,
    request: ErpApiRequest,
    request_id: RequestId,
) -> Result<Response, ApiError> {
    authorize_store(state, user_id, store_id, request_id).await?;

    let credential = state
        .broker
        .get_valid_token(store_id)
        .await
        .map_err(|error| broker_error(error, request_id))?;

    let gateway = state.gateway.clone();
    let token = credential.access_token.clone();
    let response = state
        .queue
        .run(store_id, move || async move {
            gateway.call(request, &token).await
        })
        .await
        .map_err(|error| {
            ApiError::new(
                DomainError::new(ErrorCode::ErpError, error.to_string()),
                request_id,
            )
        })?;

    // Tiny's status passes through; its error bodies are part of the
    // contract the storefront already understands.
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(response.body)).into_response())
}

/// Missing and not-owned stores are indistinguishable to the caller.
async fn authorize_store(
    state: &ErpAppState,
    user_id: &UserId,
    store_id: StoreId,
    request_id: RequestId,
) -> Result<(), ApiError> {
    let not_found = || {
        ApiError::new(
            DomainError::new(ErrorCode::StoreNotFound, "Store not found"),
            request_id,
        )
    };

    let store = state
        .stores
        .find_by_id(store_id)
        .await
        .map_err(|error| ApiError::new(error, request_id))?
        .ok_or_else(not_found)?;
    if !store.is_owned_by(user_id) {
        return Err(not_found());
    }
    Ok(())
}

fn broker_error(error: TokenBrokerError, request_id: RequestId) -> ApiError {
    ApiError::new(
        DomainError::new(error.error_code(), error.to_string()),
        request_id,
    )
}

fn parse_store_id(raw: Option<String>, request_id: RequestId) -> Result<StoreId, ApiError> {
    raw.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::validation("storeId", "storeId is required", request_id))?
        .parse::<StoreId>()
        .map_err(|_| ApiError::validation("storeId", "storeId must be a UUID", request_id))
}

fn parse_path(raw: Option<String>, request_id: RequestId) -> Result<String, ApiError> {
    let path = raw
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::validation("path", "path is required", request_id))?;
    if !path.starts_with('/') {
        return Err(ApiError::validation(
            "path",
            "path must start with '/'",
            request_id,
        ));
    }
    Ok(path)
}
