//! Prompt-injection scrubbing applied to transcripts before summarization.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CHARS: usize = 60_000;

const DEFAULT_PATTERNS: &[&str] = &[
    r"ignore (all )?(previous|above|earlier) (instructions|prompts|rules)",
    r"disregard (all )?(previous|above|earlier)",
    r"forget (all )?(previous|above|earlier)",
    r"you are now?",
    r"new instructions?:",
    r"system:?",
    r"assistant:?",
    r"\[system\]",
    r"\[assistant\]",
    r"\[user\]",
    r"```",
    r"~~~\s*json",
    r"<\|.*?\|>",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    pub patterns: Vec<String>,
    pub max_chars: usize,
    pub replacement: String,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            max_chars: DEFAULT_MAX_CHARS,
            replacement: "[REDACTED]".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptSanitizer {
    patterns: Vec<Regex>,
    max_chars: usize,
    replacement: String,
}

impl TranscriptSanitizer {
    pub fn new(config: &SanitizerConfig) -> Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("invalid sanitizer pattern {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            max_chars: config.max_chars,
            replacement: config.replacement.clone(),
        })
    }

    pub fn sanitize(&self, transcript: &str) -> String {
        let mut sanitized = transcript.to_string();
        for pattern in &self.patterns {
            sanitized = pattern
                .replace_all(&sanitized, self.replacement.as_str())
                .into_owned();
        }

        if sanitized.chars().count() > self.max_chars {
            let mut truncated: String = sanitized.chars().take(self.max_chars).collect();
            truncated.push_str("...");
            return truncated;
        }
        sanitized
    }
}

impl Default for TranscriptSanitizer {
    fn default() -> Self {
        // The built-in patterns are known to compile.
        Self::new(&SanitizerConfig::default()).unwrap_or_else(|_| Self {
            patterns: Vec::new(),
            max_chars: DEFAULT_MAX_CHARS,
            replacement: "[REDACTED]".to_string(),
        })
    }
}
