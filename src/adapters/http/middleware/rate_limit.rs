//! Per-IP rate limiting middleware.
//!
//! The middleware applies the general per-IP limit to every request passing
//! through it and annotates allowed responses with `X-RateLimit-*` headers.
//! Endpoint-specific limits (the ERP token exchange) are checked inside the
//! handler via [`RateLimitCheck`] so they can use their own window.
//!
//! Limiter backend failures fail OPEN: an unreachable Redis must not take
//! the billing API down with it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::warn;

use crate::ports::{RateLimitDenied, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter};

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared state for rate limiting.
pub type RateLimitState = Arc<dyn RateLimiter>;

/// Resolve the client IP for rate limiting.
///
/// Trusts `X-Forwarded-For` (first hop) and `X-Real-IP` before falling back
/// to the socket peer address; behind the reverse proxy the peer address is
/// always the proxy itself.
pub fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// General per-IP rate limit across the API surface.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), connect_info.as_ref());

    match limiter.check(RateLimitKey::ip(&ip)).await {
        Ok(RateLimitResult::Allowed(status)) => {
            let mut response = next.run(request).await;
            apply_status_headers(response.headers_mut(), &status);
            response
        }
        Ok(RateLimitResult::Denied(denied)) => rate_limit_response(&denied),
        Err(error) => {
            warn!(%error, %ip, "rate limiter unavailable, failing open");
            next.run(request).await
        }
    }
}

/// Handler-level rate limit check for endpoints with their own window.
pub struct RateLimitCheck;

impl RateLimitCheck {
    /// Check a resource-scoped limit, failing open on limiter errors.
    ///
    /// Returns the ready-made 429 response on denial.
    pub async fn check_resource(
        limiter: &dyn RateLimiter,
        ip: &str,
        resource: &str,
    ) -> Result<(), Response> {
        match limiter.check(RateLimitKey::ip_resource(ip, resource)).await {
            Ok(RateLimitResult::Allowed(_)) => Ok(()),
            Ok(RateLimitResult::Denied(denied)) => Err(rate_limit_response(&denied)),
            Err(error) => {
                warn!(%error, %ip, resource, "rate limiter unavailable, failing open");
                Ok(())
            }
        }
    }
}

fn apply_status_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), header_value(status.limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), header_value(status.remaining));
    if let Ok(reset) = HeaderValue::from_str(&status.reset_at.as_unix_secs().to_string()) {
        headers.insert(X_RATELIMIT_RESET.clone(), reset);
    }
}

fn header_value(value: u32) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// 429 response with `Retry-After` set to the full window, matching the
/// behavior clients already code against.
fn rate_limit_response(denied: &RateLimitDenied) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": denied.message,
            "code": "RATE_LIMITED",
            "retryAfterSecs": denied.window_secs,
        })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&denied.window_secs.to_string()) {
        response
            .headers_mut()
            .insert(axum::http::header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
    use crate::adapters::rate_limiter::TOKEN_EXCHANGE_RESOURCE;

    // ─── Client IP Extraction ────────────────────────────────────────

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_ip(&headers, None), "203.0.113.7");
    }

    #[test]
    fn real_ip_is_second_choice() {
        let headers = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&headers, None), "198.51.100.2");
    }

    #[test]
    fn falls_back_to_socket_address() {
        let addr: SocketAddr = "192.0.2.1:4444".parse().unwrap();
        let info = ConnectInfo(addr);
        assert_eq!(client_ip(&HeaderMap::new(), Some(&info)), "192.0.2.1");
    }

    #[test]
    fn unknown_when_nothing_available() {
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    // ─── Resource Check ──────────────────────────────────────────────

    #[tokio::test]
    async fn resource_denial_sets_retry_after_to_full_window() {
        let config = RateLimitConfig::default().with_token_exchange_limit(1, 900);
        let limiter = InMemoryRateLimiter::new(config);

        RateLimitCheck::check_resource(&limiter, "203.0.113.9", TOKEN_EXCHANGE_RESOURCE)
            .await
            .unwrap();
        let denied = RateLimitCheck::check_resource(&limiter, "203.0.113.9", TOKEN_EXCHANGE_RESOURCE)
            .await
            .unwrap_err();

        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            denied.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "900"
        );
    }

    #[tokio::test]
    async fn resource_check_allows_within_limit() {
        let limiter = InMemoryRateLimiter::with_defaults();

        let result =
            RateLimitCheck::check_resource(&limiter, "203.0.113.9", TOKEN_EXCHANGE_RESOURCE).await;

        assert!(result.is_ok());
    }
}
