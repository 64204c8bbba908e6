//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port:
//!
//! - `InMemoryRateLimiter` - in-memory for testing and single-server
//! - `RedisRateLimiter` - Redis-backed for production multi-server

mod config;
mod in_memory;
mod redis;

pub use config::{
    IpLimits, RateLimitConfig, ResourceLimits, UserLimits, TOKEN_EXCHANGE_RESOURCE,
};
pub use in_memory::InMemoryRateLimiter;
pub use redis::RedisRateLimiter;
