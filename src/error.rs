use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::rate_limiter::RateLimitResult;

/// Stable, machine-readable failure kinds surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    InsufficientCredits,
    InvalidUrl,
    VideoNotFound,
    TranscriptNotFound,
    ApiKeyInvalid,
    RateLimitExceeded,
    AiResponseParseError,
    VideoTooLong,
    RequestTimeout,
    PayloadTooLarge,
    InvalidJson,
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 14] = [
        ErrorCode::Unauthorized,
        ErrorCode::NotFound,
        ErrorCode::InsufficientCredits,
        ErrorCode::InvalidUrl,
        ErrorCode::VideoNotFound,
        ErrorCode::TranscriptNotFound,
        ErrorCode::ApiKeyInvalid,
        ErrorCode::RateLimitExceeded,
        ErrorCode::AiResponseParseError,
        ErrorCode::VideoTooLong,
        ErrorCode::RequestTimeout,
        ErrorCode::PayloadTooLarge,
        ErrorCode::InvalidJson,
        ErrorCode::Internal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InsufficientCredits => "INSUFFICIENT_CREDITS",
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::VideoNotFound => "VIDEO_NOT_FOUND",
            ErrorCode::TranscriptNotFound => "TRANSCRIPT_NOT_FOUND",
            ErrorCode::ApiKeyInvalid => "API_KEY_INVALID",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::AiResponseParseError => "AI_RESPONSE_PARSE_ERROR",
            ErrorCode::VideoTooLong => "VIDEO_TOO_LONG",
            ErrorCode::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::ApiKeyInvalid => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound | ErrorCode::VideoNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::InvalidUrl | ErrorCode::VideoTooLong | ErrorCode::InvalidJson => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::TranscriptNotFound => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::AiResponseParseError | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Client-facing message used when no more specific text applies.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required. Please sign in to analyze videos.",
            ErrorCode::NotFound => "Profile not found. Please try signing out and back in.",
            ErrorCode::InsufficientCredits => {
                "Insufficient credits. You need at least 1 credit to analyze a video."
            }
            ErrorCode::InvalidUrl => "Invalid YouTube URL",
            ErrorCode::VideoNotFound => "Video not found or unavailable",
            ErrorCode::TranscriptNotFound => "Transcript not available for this video",
            ErrorCode::ApiKeyInvalid => "API configuration error",
            ErrorCode::RateLimitExceeded => "Too many requests. Please try again later.",
            ErrorCode::AiResponseParseError => "AI analysis failed. Please try again",
            ErrorCode::VideoTooLong => "Video is too long for analysis",
            ErrorCode::RequestTimeout => "Request timed out. Please try again",
            ErrorCode::PayloadTooLarge => "Request body too large",
            ErrorCode::InvalidJson => "Invalid JSON",
            ErrorCode::Internal => "Internal Server Error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised inside the service and by its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("http error: {0}")]
    Http(reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A collaborator failure that already carries its classification.
    #[error("{code}: {detail}")]
    Upstream { code: ErrorCode, detail: String },

    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    /// Request URLs can carry credentials, so they are dropped before the
    /// error is logged or displayed.
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.without_url())
    }
}

impl Error {
    pub fn upstream(code: ErrorCode, detail: impl Into<String>) -> Self {
        Error::Upstream {
            code,
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Upstream { code, .. } => *code,
            Error::Http(err) if err.is_timeout() => ErrorCode::RequestTimeout,
            _ => ErrorCode::Internal,
        }
    }
}

/// Error returned to HTTP clients. Never carries upstream bodies.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub credits_remaining: Option<i64>,
    pub rate_limit: Option<RateLimitResult>,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            credits_remaining: None,
            rate_limit: None,
            retry_after_secs: None,
        }
    }

    pub fn insufficient_credits(balance: i64) -> Self {
        Self {
            credits_remaining: Some(balance),
            ..Self::new(ErrorCode::InsufficientCredits)
        }
    }

    pub fn rate_limited(result: RateLimitResult, now_ms: u64) -> Self {
        let wait_ms = result.reset_time.saturating_sub(now_ms);
        Self {
            rate_limit: Some(result),
            retry_after_secs: Some(wait_ms.div_ceil(1000)),
            ..Self::new(ErrorCode::RateLimitExceeded)
        }
    }

    /// Map a collaborator failure onto the client table. Classified failures
    /// get their table message; anything else gets `fallback`.
    pub fn from_collaborator(err: &Error, fallback: &str) -> Self {
        match err.code() {
            ErrorCode::Internal => Self::with_message(ErrorCode::Internal, fallback),
            code => Self::new(code),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status().as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::from_collaborator(&err, ErrorCode::Internal.default_message())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<i64>,
}

impl ErrorResponse {
    pub fn from_api_error(err: &ApiError) -> Self {
        Self {
            error: err.message.clone(),
            code: err.code,
            credits_remaining: err.credits_remaining,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(ErrorResponse::from_api_error(&self))).into_response();

        if let Some(limit) = &self.rate_limit {
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(limit.remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(limit.reset_time));
        }
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(secs));
        }

        response
    }
}
