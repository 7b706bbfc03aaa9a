//! YouTube URL parsing.

use regex::Regex;
use std::sync::LazyLock;

static VIDEO_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // watch?v=, youtu.be/ and embed/
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([a-zA-Z0-9_-]{11})",
        r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/live/([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Returns the 11-character video id from a recognized link shape.
///
/// Total over its input: `None`, empty strings and foreign URLs all yield
/// `None`.
pub fn extract_video_id<'a>(url: impl Into<Option<&'a str>>) -> Option<&'a str> {
    let url = url.into().filter(|u| !u.is_empty())?;

    VIDEO_URL_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    })
}

pub fn is_valid_youtube_url(url: &str) -> bool {
    extract_video_id(url).is_some()
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)
}
