use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-window limit applied to one class of endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub limit: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

/// Limits for each protected route class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLimits {
    pub summarize: RateLimitConfig,
    pub health: RateLimitConfig,
}

impl RateLimitConfig {
    /// Create a new rate limit config
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn summarize() -> Self {
        Self::new(10, Duration::from_millis(60_000))
    }

    pub const fn health() -> Self {
        Self::new(60, Duration::from_millis(60_000))
    }

    pub fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    /// Validate rule parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("Rate limit must be greater than 0".to_string());
        }
        if self.window_ms() == 0 {
            return Err("Rate limit window must be at least 1ms".to_string());
        }
        Ok(())
    }
}

impl Default for RouteLimits {
    fn default() -> Self {
        Self {
            summarize: RateLimitConfig::summarize(),
            health: RateLimitConfig::health(),
        }
    }
}

impl RouteLimits {
    pub fn validate(&self) -> Result<(), String> {
        self.summarize
            .validate()
            .map_err(|e| format!("summarize: {}", e))?;
        self.health.validate().map_err(|e| format!("health: {}", e))
    }
}
