use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::video_id::is_valid_youtube_url;

pub const URL_REQUIRED: &str = "URL is required";
pub const URL_MALFORMED: &str = "Invalid URL format";
pub const URL_NOT_YOUTUBE: &str = "URL must be a valid YouTube link";

const YOUTUBE_URL_CODE: &str = "youtube_url";

/// Body of `POST /summarize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SummarizeRequest {
    #[validate(
        length(min = 1, message = "URL is required"),
        url(message = "Invalid URL format"),
        custom(function = "validate_youtube_url")
    )]
    pub url: String,
}

/// Outcome of validating an untrusted payload. No partial success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult<T> {
    Success(T),
    Failure(String),
}

impl<T> ValidationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success(_))
    }
}

fn validate_youtube_url(url: &str) -> Result<(), ValidationError> {
    if is_valid_youtube_url(url) {
        Ok(())
    } else {
        Err(ValidationError::new(YOUTUBE_URL_CODE).with_message(Cow::Borrowed(URL_NOT_YOUTUBE)))
    }
}

/// Position of a rule in the reported message, so output order does not
/// depend on how the derive happens to emit checks.
fn rule_rank(code: &str) -> u8 {
    match code {
        "length" => 0,
        "url" => 1,
        YOUTUBE_URL_CODE => 2,
        _ => 3,
    }
}

/// Validate an untrusted `POST /summarize` body.
///
/// Every violated rule is reported, joined with `"; "`. A missing or
/// non-string `url` reports only the required rule.
pub fn validate_summarize_request(input: &Value) -> ValidationResult<SummarizeRequest> {
    let Some(url) = input.get("url").and_then(Value::as_str) else {
        return ValidationResult::Failure(URL_REQUIRED.to_string());
    };

    let request = SummarizeRequest {
        url: url.to_string(),
    };

    match request.validate() {
        Ok(()) => ValidationResult::Success(request),
        Err(errors) => {
            let mut violations: Vec<(u8, String)> = errors
                .field_errors()
                .get("url")
                .map(|errs| {
                    errs.iter()
                        .map(|e| {
                            let message = e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string());
                            (rule_rank(&e.code), message)
                        })
                        .collect()
                })
                .unwrap_or_default();
            violations.sort_by_key(|(rank, _)| *rank);

            let message = violations
                .into_iter()
                .map(|(_, message)| message)
                .collect::<Vec<_>>()
                .join("; ");
            ValidationResult::Failure(message)
        }
    }
}
