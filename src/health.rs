use serde::Serialize;
use std::sync::LazyLock;
use std::time::SystemTime;

use crate::metrics::AdmissionMetrics;
use crate::rate_limit_config::RouteLimits;
use crate::rate_limiter::RateLimiter;

static START_TIME: LazyLock<SystemTime> = LazyLock::new(SystemTime::now);

/// Static status payload served by `GET /summarize`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
    pub features: Vec<&'static str>,
    pub uptime_seconds: u64,
    pub rate_limit: RateLimitStatus,
    pub admissions: AdmissionMetrics,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatus {
    pub backend: &'static str,
    pub healthy: bool,
    pub limits: RouteLimits,
}

pub struct HealthChecker {
    rate_limiter: RateLimiter,
    limits: RouteLimits,
}

impl HealthChecker {
    pub fn new(rate_limiter: RateLimiter, limits: RouteLimits) -> Self {
        // Pin the uptime origin to construction rather than first probe.
        LazyLock::force(&START_TIME);
        Self {
            rate_limiter,
            limits,
        }
    }

    pub async fn check_health(&self, admissions: AdmissionMetrics) -> HealthStatus {
        let uptime = SystemTime::now()
            .duration_since(*START_TIME)
            .unwrap_or_default()
            .as_secs();

        let healthy = match self.rate_limiter.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    target: "verdict_gate::health",
                    error = %e,
                    "Rate limit store did not answer ping"
                );
                false
            }
        };

        HealthStatus {
            status: "ok",
            message: "Verdict API is running",
            version: env!("CARGO_PKG_VERSION"),
            features: vec!["authentication", "credits", "rate-limiting"],
            uptime_seconds: uptime,
            rate_limit: RateLimitStatus {
                backend: self.rate_limiter.backend(),
                healthy,
                limits: self.limits,
            },
            admissions,
        }
    }
}
