use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::collaborators::{TranscriptProvider, VideoData};
use crate::error::{Error, ErrorCode, Result};
use crate::video_id::{extract_video_id, thumbnail_url};

pub const DEFAULT_SUPADATA_BASE_URL: &str = "https://api.supadata.ai/v1/youtube";

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    content: Vec<TranscriptChunk>,
}

#[derive(Debug, Deserialize)]
struct TranscriptChunk {
    #[serde(default)]
    text: Option<String>,
}

/// Transcript provider backed by the Supadata HTTP API.
pub struct SupadataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupadataClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

/// Classify a non-success upstream status.
pub fn classify_status(status: StatusCode) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::upstream(ErrorCode::VideoNotFound, "transcript provider returned 404"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::upstream(ErrorCode::ApiKeyInvalid, "transcript provider rejected the API key")
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Error::upstream(ErrorCode::RateLimitExceeded, "transcript provider rate limited us")
        }
        other => Error::UpstreamStatus(other.as_u16()),
    }
}

fn join_transcript(response: TranscriptResponse) -> Result<String> {
    if response.content.is_empty() {
        return Err(Error::upstream(
            ErrorCode::TranscriptNotFound,
            "transcript provider returned no content",
        ));
    }
    Ok(response
        .content
        .into_iter()
        .map(|chunk| chunk.text.unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" "))
}

#[async_trait]
impl TranscriptProvider for SupadataClient {
    async fn fetch_transcript_and_metadata(&self, url: &str) -> Result<VideoData> {
        tracing::debug!(target: "verdict_gate::transcript", url = %url, "Fetching transcript");

        let response = self
            .http
            .get(format!("{}/transcript", self.base_url))
            .query(&[("url", url)])
            .header("x-api-key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                target: "verdict_gate::transcript",
                status = status.as_u16(),
                "Transcript provider returned an error status"
            );
            return Err(classify_status(status));
        }

        let transcript = join_transcript(response.json::<TranscriptResponse>().await?)?;
        tracing::debug!(
            target: "verdict_gate::transcript",
            chars = transcript.len(),
            "Transcript received"
        );

        let video_id = extract_video_id(url).unwrap_or("unknown").to_string();
        Ok(VideoData {
            thumbnail_url: thumbnail_url(&video_id),
            video_id,
            // This endpoint does not return title or channel metadata.
            title: String::new(),
            channel_name: String::new(),
            transcript,
        })
    }
}
