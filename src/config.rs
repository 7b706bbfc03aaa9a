use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::admission::PipelineSettings;
use crate::rate_limit_config::{RateLimitConfig, RouteLimits};
use crate::sanitize::SanitizerConfig;
use crate::summarizer::DEFAULT_GEMINI_MODEL;
use crate::transcript::DEFAULT_SUPADATA_BASE_URL;

#[derive(Debug, Clone, Parser)]
#[command(name = "verdict-gate")]
#[command(about = "Admission, credit metering and rate limiting for video summaries")]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind_addr: String,

    /// Redis URL; when set, rate-limit counters are shared through Redis
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Max summarize requests per client per window
    #[arg(long, env = "SUMMARIZE_RATE_LIMIT", default_value_t = 10)]
    pub summarize_rate_limit: u32,

    #[arg(long, env = "SUMMARIZE_WINDOW_MS", default_value_t = 60_000)]
    pub summarize_window_ms: u64,

    /// Max health probes per client per window
    #[arg(long, env = "HEALTH_RATE_LIMIT", default_value_t = 60)]
    pub health_rate_limit: u32,

    #[arg(long, env = "HEALTH_WINDOW_MS", default_value_t = 60_000)]
    pub health_window_ms: u64,

    /// Period of the expired-entry sweep
    #[arg(long, env = "SWEEP_INTERVAL_MS", default_value_t = 60_000)]
    pub sweep_interval_ms: u64,

    /// Ceiling on the declared request body size
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 1024)]
    pub max_body_bytes: usize,

    #[arg(long, env = "ANALYSIS_COST", default_value_t = 1)]
    pub analysis_cost: i64,

    #[arg(long, env = "TRANSCRIPT_TIMEOUT_SECS", default_value_t = 30)]
    pub transcript_timeout_secs: u64,

    /// Transcript length sent to the summarizer, in characters
    #[arg(long, env = "TRANSCRIPT_MAX_CHARS", default_value_t = 60_000)]
    pub transcript_max_chars: usize,

    #[arg(long, env = "SUPADATA_API_KEY", default_value = "", hide_env_values = true)]
    pub supadata_api_key: String,

    #[arg(long, env = "SUPADATA_BASE_URL", default_value = DEFAULT_SUPADATA_BASE_URL)]
    pub supadata_base_url: String,

    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub gemini_api_key: String,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,

    /// Bearer tokens as `token=user_id` pairs separated by commas
    #[arg(long, env = "AUTH_TOKENS", default_value = "", hide_env_values = true)]
    pub auth_tokens: String,

    /// Balance given to every configured user at startup
    #[arg(long, env = "STARTING_CREDITS", default_value_t = 5)]
    pub starting_credits: i64,
}

impl Config {
    pub fn bind_socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_addr.parse()
    }

    pub fn route_limits(&self) -> RouteLimits {
        RouteLimits {
            summarize: RateLimitConfig::new(
                self.summarize_rate_limit,
                Duration::from_millis(self.summarize_window_ms),
            ),
            health: RateLimitConfig::new(
                self.health_rate_limit,
                Duration::from_millis(self.health_window_ms),
            ),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn transcript_timeout(&self) -> Duration {
        Duration::from_secs(self.transcript_timeout_secs)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            rate_limit: self.route_limits().summarize,
            max_body_bytes: self.max_body_bytes,
            analysis_cost: self.analysis_cost,
            transcript_timeout: self.transcript_timeout(),
        }
    }

    pub fn sanitizer_config(&self) -> SanitizerConfig {
        SanitizerConfig {
            max_chars: self.transcript_max_chars,
            ..SanitizerConfig::default()
        }
    }
}
