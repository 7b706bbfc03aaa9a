//! Contracts for the services the admission pipeline delegates to.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub thumbnail_url: String,
    pub transcript: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    MustWatch,
    Skip,
    RecapOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SummaryItem {
    #[validate(length(min = 1))]
    pub emoji: String,
    #[validate(length(min = 1))]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub verdict: Verdict,
    #[validate(length(min = 1))]
    pub verdict_label: String,
    #[validate(length(min = 1))]
    pub verdict_description: String,
    #[validate(length(min = 1, max = 10), nested)]
    pub summary: Vec<SummaryItem>,
}

impl Analysis {
    /// Bullet texts joined one per line, as stored in history.
    pub fn summary_text(&self) -> String {
        self.summary
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub user_id: String,
    pub url: String,
    pub video_id: String,
    pub verdict: Verdict,
    pub summary_text: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the caller from request credentials. `None` when anonymous.
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>>;
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// `None` when the user has no balance record.
    async fn balance(&self, user_id: &str) -> Result<Option<i64>>;

    async fn deduct(&self, user_id: &str, amount: i64, description: &str) -> Result<()>;
}

#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch_transcript_and_metadata(&self, url: &str) -> Result<VideoData>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// `transcript` has already been sanitized and truncated.
    async fn analyze(&self, transcript: &str) -> Result<Analysis>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<()>;
}

/// Everything the pipeline calls out to once a request is admitted.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthProvider>,
    pub ledger: Arc<dyn CreditLedger>,
    pub transcripts: Arc<dyn TranscriptProvider>,
    pub summarizer: Arc<dyn Summarizer>,
    pub history: Arc<dyn HistoryStore>,
}
