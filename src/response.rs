use serde::{Deserialize, Serialize};

use crate::collaborators::{Analysis, SummaryItem, Verdict, VideoData};

/// Successful `POST /summarize` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub thumbnail_url: String,
    pub verdict: Verdict,
    pub verdict_label: String,
    pub verdict_description: String,
    pub summary: Vec<SummaryItem>,
    pub credits_remaining: i64,
}

impl SummarizeResponse {
    pub fn new(video: VideoData, analysis: Analysis, credits_remaining: i64) -> Self {
        Self {
            video_id: video.video_id,
            title: video.title,
            channel_name: video.channel_name,
            thumbnail_url: video.thumbnail_url,
            verdict: analysis.verdict,
            verdict_label: analysis.verdict_label,
            verdict_description: analysis.verdict_description,
            summary: analysis.summary,
            credits_remaining,
        }
    }
}
