pub mod admission;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod redis;
pub mod response;
pub mod sanitize;
pub mod server;
pub mod summarizer;
pub mod transcript;
pub mod validation;
pub mod video_id;

pub use admission::{Gate, InboundRequest, PipelineSettings, SummarizePipeline, DEFAULT_GATES};
pub use config::Config;
pub use error::{ApiError, Error, ErrorCode, Result};
pub use rate_limit_config::{RateLimitConfig, RouteLimits};
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use response::SummarizeResponse;
pub use server::{create_app, Server};
