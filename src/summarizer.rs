use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use validator::Validate;

use crate::collaborators::{Analysis, Summarizer};
use crate::error::{Error, ErrorCode, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-lite-latest";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const SYSTEM_PROMPT: &str = r#"You help people decide whether a video is worth their time. Read the transcript and answer with JSON only, no markdown and no code fences.

1. "verdict" is one of:
   - "MUST_WATCH": unique, dense content with practical examples
   - "SKIP": clickbait, filler, or common knowledge
   - "RECAP_ONLY": the gist is clear from the title and description
2. "verdictLabel": a short phrase for the verdict.
3. "verdictDescription": one sentence explaining the verdict.
4. "summary": an array of 5-7 objects of the form {"emoji": "...", "text": "..."}, text 10-20 words. Keep the emoji out of the text.
"#;

/// Parse and shape-check a model reply.
///
/// A surrounding code fence is tolerated. Any syntax or shape problem is an
/// `AI_RESPONSE_PARSE_ERROR`.
pub fn parse_analysis(raw: &str) -> Result<Analysis> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    let analysis: Analysis = serde_json::from_str(text).map_err(|e| {
        Error::upstream(ErrorCode::AiResponseParseError, format!("unparseable reply: {}", e))
    })?;
    analysis.validate().map_err(|e| {
        Error::upstream(ErrorCode::AiResponseParseError, format!("invalid reply shape: {}", e))
    })?;
    Ok(analysis)
}

fn classify_model_status(status: StatusCode) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::upstream(ErrorCode::ApiKeyInvalid, "summarizer rejected the API key")
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Error::upstream(ErrorCode::RateLimitExceeded, "summarizer rate limited us")
        }
        other => Error::UpstreamStatus(other.as_u16()),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Summarizer backed by the Gemini `generateContent` endpoint.
pub struct GeminiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

impl GeminiSummarizer {
    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        // The key travels in a header so it never appears in a logged URL.
        self.http
            .post(format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn analyze(&self, transcript: &str) -> Result<Analysis> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("{}\nTranscript:\n{}", SYSTEM_PROMPT, transcript) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.2,
                "maxOutputTokens": 2048
            }
        });

        let response = self.request(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                target: "verdict_gate::summarizer",
                status = status.as_u16(),
                "Summarizer returned an error status"
            );
            return Err(classify_model_status(status));
        }

        let text = response
            .json::<GenerateResponse>()
            .await?
            .text()
            .ok_or_else(|| Error::upstream(ErrorCode::AiResponseParseError, "empty model reply"))?;
        tracing::debug!(target: "verdict_gate::summarizer", chars = text.len(), "Model replied");

        parse_analysis(&text)
    }
}
