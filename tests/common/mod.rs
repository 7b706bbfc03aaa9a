//! Shared test doubles for the admission pipeline

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use verdict_gate::collaborators::{
    Analysis, AuthProvider, Collaborators, CreditLedger, HistoryEntry, HistoryStore, SummaryItem,
    Summarizer, TranscriptProvider, User, Verdict, VideoData,
};
use verdict_gate::handlers::AppState;
use verdict_gate::rate_limit_config::{RateLimitConfig, RouteLimits};
use verdict_gate::rate_limiter::{InMemoryStore, ManualClock, RateLimitResult, RateLimitStore, RateLimiter};
use verdict_gate::sanitize::{SanitizerConfig, TranscriptSanitizer};
use verdict_gate::{create_app, Error, ErrorCode, InboundRequest, PipelineSettings, SummarizePipeline};

pub const VIDEO_ID: &str = "dQw4w9WgXcQ";
pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
pub const CLIENT_IP: &str = "203.0.113.7";
pub const START_MS: u64 = 1_700_000_000_000;

pub fn video() -> VideoData {
    VideoData {
        video_id: VIDEO_ID.to_string(),
        title: "Never Gonna Give You Up".to_string(),
        channel_name: "Rick Astley".to_string(),
        thumbnail_url: format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", VIDEO_ID),
        transcript: "We're no strangers to love. You know the rules and so do I.".to_string(),
    }
}

pub fn analysis() -> Analysis {
    Analysis {
        verdict: Verdict::MustWatch,
        verdict_label: "Classic".to_string(),
        verdict_description: "Worth every second.".to_string(),
        summary: vec![
            SummaryItem {
                emoji: "🎤".to_string(),
                text: "A commitment is made".to_string(),
            },
            SummaryItem {
                emoji: "🕺".to_string(),
                text: "Dancing follows".to_string(),
            },
        ],
    }
}

pub struct StubAuth {
    user: Option<User>,
    pub calls: AtomicUsize,
}

impl StubAuth {
    pub fn signed_in(id: &str) -> Self {
        Self {
            user: Some(User { id: id.to_string() }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuthProvider for StubAuth {
    async fn current_user(&self, _headers: &HeaderMap) -> verdict_gate::Result<Option<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.user.clone())
    }
}

pub struct StubLedger {
    balance: Mutex<Option<i64>>,
    fail_deduct: bool,
    pub balance_calls: AtomicUsize,
    pub deductions: Mutex<Vec<(String, i64, String)>>,
}

impl StubLedger {
    pub fn with_balance(balance: i64) -> Self {
        Self {
            balance: Mutex::new(Some(balance)),
            fail_deduct: false,
            balance_calls: AtomicUsize::new(0),
            deductions: Mutex::new(Vec::new()),
        }
    }

    pub fn without_profile() -> Self {
        Self {
            balance: Mutex::new(None),
            ..Self::with_balance(0)
        }
    }

    pub fn failing_deduct(balance: i64) -> Self {
        Self {
            fail_deduct: true,
            ..Self::with_balance(balance)
        }
    }

    pub fn deductions(&self) -> Vec<(String, i64, String)> {
        self.deductions.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditLedger for StubLedger {
    async fn balance(&self, _user_id: &str) -> verdict_gate::Result<Option<i64>> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.balance.lock().unwrap())
    }

    async fn deduct(&self, user_id: &str, amount: i64, description: &str) -> verdict_gate::Result<()> {
        if self.fail_deduct {
            return Err(Error::Internal("ledger write rejected".to_string()));
        }
        let mut balance = self.balance.lock().unwrap();
        if let Some(balance) = balance.as_mut() {
            *balance -= amount;
        }
        self.deductions
            .lock()
            .unwrap()
            .push((user_id.to_string(), amount, description.to_string()));
        Ok(())
    }
}

pub enum TranscriptOutcome {
    Video(VideoData),
    Fail(ErrorCode),
    Slow(Duration),
}

pub struct StubTranscripts {
    outcome: TranscriptOutcome,
    pub calls: AtomicUsize,
}

impl StubTranscripts {
    pub fn new(outcome: TranscriptOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranscriptProvider for StubTranscripts {
    async fn fetch_transcript_and_metadata(&self, _url: &str) -> verdict_gate::Result<VideoData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            TranscriptOutcome::Video(video) => Ok(video.clone()),
            TranscriptOutcome::Fail(ErrorCode::Internal) => Err(Error::Internal(
                "supadata said: connection reset by 10.0.0.7".to_string(),
            )),
            TranscriptOutcome::Fail(code) => Err(Error::upstream(*code, "upstream rejected")),
            TranscriptOutcome::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(video())
            }
        }
    }
}

pub struct StubSummarizer {
    analysis: Analysis,
    failure: Option<ErrorCode>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Option<String>>,
}

impl StubSummarizer {
    pub fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            failure: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    pub fn failing(code: ErrorCode) -> Self {
        Self {
            failure: Some(code),
            ..Self::new(analysis())
        }
    }

    pub fn seen(&self) -> Option<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn analyze(&self, transcript: &str) -> verdict_gate::Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(transcript.to_string());
        match self.failure {
            Some(code) => Err(Error::upstream(code, "model reply was not JSON")),
            None => Ok(self.analysis.clone()),
        }
    }
}

#[derive(Default)]
pub struct StubHistory {
    fail: bool,
    pub entries: Mutex<Vec<HistoryEntry>>,
}

impl StubHistory {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for StubHistory {
    async fn append(&self, entry: HistoryEntry) -> verdict_gate::Result<()> {
        if self.fail {
            return Err(Error::Internal("history table unavailable".to_string()));
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// In-memory store that counts how often it is consulted.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    pub hits: AtomicUsize,
}

#[async_trait]
impl RateLimitStore for CountingStore {
    async fn hit(
        &self,
        identity: &str,
        config: &RateLimitConfig,
        now_ms: u64,
    ) -> verdict_gate::Result<RateLimitResult> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.inner.hit(identity, config, now_ms).await
    }

    async fn sweep(&self, now_ms: u64) -> verdict_gate::Result<usize> {
        self.inner.sweep(now_ms).await
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Store whose backend is unreachable.
pub struct DownStore;

#[async_trait]
impl RateLimitStore for DownStore {
    async fn hit(
        &self,
        _identity: &str,
        _config: &RateLimitConfig,
        _now_ms: u64,
    ) -> verdict_gate::Result<RateLimitResult> {
        Err(Error::Internal("connection refused".to_string()))
    }

    async fn sweep(&self, _now_ms: u64) -> verdict_gate::Result<usize> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "down"
    }

    async fn ping(&self) -> verdict_gate::Result<()> {
        Err(Error::Internal("connection refused".to_string()))
    }
}

pub struct Harness {
    pub auth: Arc<StubAuth>,
    pub ledger: Arc<StubLedger>,
    pub transcripts: Arc<StubTranscripts>,
    pub summarizer: Arc<StubSummarizer>,
    pub history: Arc<StubHistory>,
    pub store: Arc<CountingStore>,
    pub clock: Arc<ManualClock>,
    pub settings: PipelineSettings,
}

impl Harness {
    /// Signed-in user with 5 credits, a working transcript provider and
    /// a summarize limit of 3 per minute.
    pub fn new() -> Self {
        Self {
            auth: Arc::new(StubAuth::signed_in("alice")),
            ledger: Arc::new(StubLedger::with_balance(5)),
            transcripts: Arc::new(StubTranscripts::new(TranscriptOutcome::Video(video()))),
            summarizer: Arc::new(StubSummarizer::new(analysis())),
            history: Arc::new(StubHistory::default()),
            store: Arc::new(CountingStore::default()),
            clock: Arc::new(ManualClock::new(START_MS)),
            settings: PipelineSettings {
                rate_limit: RateLimitConfig::new(3, Duration::from_secs(60)),
                ..PipelineSettings::default()
            },
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            auth: self.auth.clone(),
            ledger: self.ledger.clone(),
            transcripts: self.transcripts.clone(),
            summarizer: self.summarizer.clone(),
            history: self.history.clone(),
        }
    }

    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::new(self.store.clone(), self.clock.clone())
    }

    pub fn pipeline(&self) -> SummarizePipeline {
        self.pipeline_with(self.limiter())
    }

    pub fn pipeline_with(&self, limiter: RateLimiter) -> SummarizePipeline {
        let sanitizer = TranscriptSanitizer::new(&SanitizerConfig::default()).unwrap();
        SummarizePipeline::new(self.collaborators(), limiter, sanitizer, self.settings)
    }

    pub fn router(&self) -> axum::Router {
        let limits = RouteLimits {
            summarize: self.settings.rate_limit,
            health: RateLimitConfig::new(2, Duration::from_secs(60)),
        };
        create_app(Arc::new(AppState::new(self.pipeline(), limits)))
    }

    pub fn rate_limit_hits(&self) -> usize {
        self.store.hits.load(Ordering::SeqCst)
    }
}

pub fn headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static(CLIENT_IP));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

pub fn request(body: &str) -> InboundRequest {
    InboundRequest::new(headers(), body.to_string())
}

pub fn valid_request() -> InboundRequest {
    request(&format!(r#"{{"url":"{}"}}"#, VIDEO_URL))
}
