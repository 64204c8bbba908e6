//! Route definitions for the ERP endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{tiny_api_get, tiny_api_post, tiny_token_exchange, ErpAppState};

/// ERP routes, mounted under `/api/erp`.
pub fn erp_routes() -> Router<ErpAppState> {
    Router::new()
        .route("/tiny-token-exchange", post(tiny_token_exchange))
        .route("/tiny-api", get(tiny_api_get).post(tiny_api_post))
}
