//! In-memory rate limiter implementation for testing and development.
//!
//! Uses a fixed-window counter algorithm with an in-memory HashMap.
//! Not suitable for production multi-server deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// In-memory rate limiter for testing and single-server deployments.
///
/// Uses a fixed-window counter; each window tracks the request count and
/// resets when the window expires.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    /// Per-key window state.
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
}

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: u64,
    window_secs: u32,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Get the (limit, window_secs) pair for a key.
    fn limits_for(&self, key: &RateLimitKey) -> (u32, u32) {
        let fallback = match key.scope {
            RateLimitScope::Ip => (self.config.per_ip.requests_per_minute, 60),
            RateLimitScope::User => (self.config.per_user.requests_per_minute, 60),
        };
        match key.resource.as_deref() {
            Some(resource) => self.config.limits_for_resource(resource, fallback),
            None => fallback,
        }
    }

    fn now_secs() -> u64 {
        Timestamp::now().as_unix_secs()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let window_key = key.to_redis_key();
        let (limit, window_secs) = self.limits_for(&key);
        let now = Self::now_secs();

        let mut windows = self.windows.write().await;

        let state = windows.entry(window_key).or_insert_with(|| WindowState {
            count: 0,
            window_start: now,
            window_secs,
        });

        let window_end = state.window_start + state.window_secs as u64;
        if now >= window_end {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= limit {
            let retry_after =
                (state.window_start + state.window_secs as u64).saturating_sub(now) as u32;

            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: retry_after.max(1),
                window_secs,
                scope: key.scope,
                message: format!(
                    "Rate limit exceeded for {}. Retry after {} seconds.",
                    key.scope, retry_after
                ),
            }));
        }

        state.count += 1;
        let remaining = limit.saturating_sub(state.count);
        let reset_at = Timestamp::from_unix_secs(state.window_start + state.window_secs as u64);

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining,
            reset_at,
            window_secs,
        }))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let window_key = key.to_redis_key();
        let (limit, window_secs) = self.limits_for(&key);
        let now = Self::now_secs();

        let windows = self.windows.read().await;

        let (count, window_start) = windows
            .get(&window_key)
            .map(|state| {
                let window_end = state.window_start + state.window_secs as u64;
                if now >= window_end {
                    (0, now)
                } else {
                    (state.count, state.window_start)
                }
            })
            .unwrap_or((0, now));

        let remaining = limit.saturating_sub(count);
        let reset_at = Timestamp::from_unix_secs(window_start + window_secs as u64);

        Ok(RateLimitStatus {
            limit,
            remaining,
            reset_at,
            window_secs,
        })
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        let window_key = key.to_redis_key();
        let mut windows = self.windows.write().await;
        windows.remove(&window_key);
        Ok(())
    }
}
