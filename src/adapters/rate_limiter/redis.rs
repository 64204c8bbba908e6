//! Redis-backed rate limiter implementation for production deployments.
//!
//! Uses a fixed-window counter algorithm with Redis INCR + EXPIRE.
//! Suitable for multi-server deployments.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// Redis-backed rate limiter for production multi-server deployments.
///
/// Fixed-window counter:
/// 1. INCR the key
/// 2. If count is 1, set EXPIRE for the window duration
/// 3. If count > limit, deny the request
///
/// Requests can briefly exceed the limit at window boundaries; acceptable
/// for abuse protection.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    config: RateLimitConfig,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, config: RateLimitConfig) -> Self {
        Self { conn, config }
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
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let redis_key = key.to_redis_key();
        let (limit, window_secs) = self.limits_for(&key);

        let mut conn = self.conn.clone();

        let count: i64 = conn
            .incr(&redis_key, 1_i64)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        // Set expiry on first request in window
        if count == 1 {
            conn.expire::<_, ()>(&redis_key, window_secs as i64)
                .await
                .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;
        }

        let ttl: i64 = conn
            .ttl(&redis_key)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        let now = Timestamp::now().as_unix_secs();
        let reset_secs = if ttl > 0 { ttl as u64 } else { window_secs as u64 };
        let reset_at = Timestamp::from_unix_secs(now + reset_secs);

        if count as u32 > limit {
            let retry_after = reset_secs as u32;
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

        let remaining = limit.saturating_sub(count as u32);

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining,
            reset_at,
            window_secs,
        }))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let redis_key = key.to_redis_key();
        let (limit, window_secs) = self.limits_for(&key);

        let mut conn = self.conn.clone();

        let count: Option<i64> = conn
            .get(&redis_key)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        let count = count.unwrap_or(0) as u32;
        let remaining = limit.saturating_sub(count);

        let ttl: i64 = conn
            .ttl(&redis_key)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        let now = Timestamp::now().as_unix_secs();
        let reset_secs = if ttl > 0 { ttl as u64 } else { window_secs as u64 };
        let reset_at = Timestamp::from_unix_secs(now + reset_secs);

        Ok(RateLimitStatus {
            limit,
            remaining,
            reset_at,
            window_secs,
        })
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        let redis_key = key.to_redis_key();
        let mut conn = self.conn.clone();

        conn.del::<_, ()>(&redis_key)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        Ok(())
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
