//! Rate limit configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource name for Tiny OAuth token exchanges.
pub const TOKEN_EXCHANGE_RESOURCE: &str = "token_exchange";

/// Complete rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Per-IP rate limits (brute-force protection).
    pub per_ip: IpLimits,
    /// Per-authenticated-user rate limits.
    pub per_user: UserLimits,
    /// Per-resource rate limits (specific endpoint limits).
    pub resources: HashMap<String, ResourceLimits>,
}

/// Per-IP rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpLimits {
    /// Maximum requests per minute per IP.
    pub requests_per_minute: u32,
}

/// Per-user rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLimits {
    /// Maximum requests per minute per user.
    pub requests_per_minute: u32,
}

/// Rate limits for a specific resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum requests per window.
    pub requests_per_window: u32,
    /// Window duration in seconds.
    pub window_secs: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut resources = HashMap::new();
        resources.insert(
            TOKEN_EXCHANGE_RESOURCE.to_string(),
            ResourceLimits {
                requests_per_window: 100,
                window_secs: 900,
            },
        );

        Self {
            per_ip: IpLimits {
                requests_per_minute: 100,
            },
            per_user: UserLimits {
                requests_per_minute: 300,
            },
            resources,
        }
    }
}

impl RateLimitConfig {
    /// Override the token exchange limit, e.g. from `ErpConfig`.
    pub fn with_token_exchange_limit(mut self, requests_per_window: u32, window_secs: u32) -> Self {
        self.resources.insert(
            TOKEN_EXCHANGE_RESOURCE.to_string(),
            ResourceLimits {
                requests_per_window,
                window_secs,
            },
        );
        self
    }

    /// Get the (limit, window_secs) pair for a resource, falling back to the
    /// scope default when the resource has no explicit entry.
    pub fn limits_for_resource(&self, resource: &str, fallback: (u32, u32)) -> (u32, u32) {
        self.resources
            .get(resource)
            .map(|r| (r.requests_per_window, r.window_secs))
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_token_exchange_limit_is_100_per_15_minutes() {
        let config = RateLimitConfig::default();
        let (limit, window) = config.limits_for_resource(TOKEN_EXCHANGE_RESOURCE, (0, 0));
        assert_eq!(limit, 100);
        assert_eq!(window, 900);
    }

    #[test]
    fn default_ip_limit_is_100_per_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.per_ip.requests_per_minute, 100);
    }

    #[test]
    fn token_exchange_limit_is_overridable() {
        let config = RateLimitConfig::default().with_token_exchange_limit(10, 60);
        let (limit, window) = config.limits_for_resource(TOKEN_EXCHANGE_RESOURCE, (0, 0));
        assert_eq!(limit, 10);
        assert_eq!(window, 60);
    }

    #[test]
    fn unknown_resource_falls_back_to_scope_default() {
        let config = RateLimitConfig::default();
        let (limit, window) = config.limits_for_resource("unknown", (42, 60));
        assert_eq!(limit, 42);
        assert_eq!(window, 60);
    }

    #[test]
    fn config_serializes_to_json() {
        let config = RateLimitConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"requests_per_minute\":100"));
    }
}
