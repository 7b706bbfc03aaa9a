//! Ordered admission gates for `POST /summarize` and the collaborator calls
//! that follow a successful admission.
//!
//! Gates run in the order held by [`SummarizePipeline::gates`]. The first
//! failing gate ends the request, and no later gate or collaborator is
//! touched.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::{header, HeaderMap, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::collaborators::{Collaborators, HistoryEntry, User};
use crate::error::{ApiError, ErrorCode};
use crate::identity::client_identity;
use crate::metrics::MetricsCollector;
use crate::rate_limit_config::RateLimitConfig;
use crate::rate_limiter::RateLimiter;
use crate::response::SummarizeResponse;
use crate::sanitize::TranscriptSanitizer;
use crate::validation::{validate_summarize_request, SummarizeRequest, ValidationResult};
use crate::video_id::extract_video_id;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024;
pub const DEFAULT_ANALYSIS_COST: i64 = 1;
pub const DEFAULT_TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Authenticate,
    ResolveProfile,
    CheckCredits,
    RateLimit,
    BodySize,
    ParseJson,
    ValidateRequest,
}

pub const DEFAULT_GATES: [Gate; 7] = [
    Gate::Authenticate,
    Gate::ResolveProfile,
    Gate::CheckCredits,
    Gate::RateLimit,
    Gate::BodySize,
    Gate::ParseJson,
    Gate::ValidateRequest,
];

impl Gate {
    pub fn name(self) -> &'static str {
        match self {
            Gate::Authenticate => "authenticate",
            Gate::ResolveProfile => "resolve_profile",
            Gate::CheckCredits => "check_credits",
            Gate::RateLimit => "rate_limit",
            Gate::BodySize => "body_size",
            Gate::ParseJson => "parse_json",
            Gate::ValidateRequest => "validate_request",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
    /// The body exceeded the transport buffering limit and was dropped.
    pub body_too_large: bool,
}

impl InboundRequest {
    pub fn new(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
            body_too_large: false,
        }
    }

    /// Build from a body extraction that may have been rejected. The
    /// rejection is held back so it surfaces at the body-size gate, after
    /// the caller has been authenticated.
    pub fn from_extracted(headers: HeaderMap, body: Result<Bytes, BytesRejection>) -> Self {
        match body {
            Ok(body) => Self::new(headers, body),
            Err(rejection) => {
                tracing::debug!(
                    target: "verdict_gate::admission",
                    status = rejection.status().as_u16(),
                    "Request body could not be buffered"
                );
                Self {
                    headers,
                    body: Bytes::new(),
                    body_too_large: rejection.status() == StatusCode::PAYLOAD_TOO_LARGE,
                }
            }
        }
    }

    /// `Content-Length` when the client declared one, else the buffered size.
    pub fn declared_len(&self) -> usize {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(self.body.len())
    }
}

/// What the gates have established so far.
#[derive(Debug, Default)]
struct AdmissionContext {
    user: Option<User>,
    balance: Option<i64>,
    body: Option<Value>,
    request: Option<SummarizeRequest>,
}

/// A request that passed every gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub user: User,
    pub balance: i64,
    pub request: SummarizeRequest,
    pub video_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub rate_limit: RateLimitConfig,
    pub max_body_bytes: usize,
    pub analysis_cost: i64,
    pub transcript_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::summarize(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            analysis_cost: DEFAULT_ANALYSIS_COST,
            transcript_timeout: DEFAULT_TRANSCRIPT_TIMEOUT,
        }
    }
}

fn missing(gate: Gate, prerequisite: &str) -> ApiError {
    tracing::error!(
        target: "verdict_gate::admission",
        gate = gate.name(),
        prerequisite,
        "Gate ran before its prerequisite"
    );
    ApiError::new(ErrorCode::Internal)
}

pub struct SummarizePipeline {
    collaborators: Collaborators,
    limiter: RateLimiter,
    sanitizer: TranscriptSanitizer,
    settings: PipelineSettings,
    gates: Vec<Gate>,
    metrics: MetricsCollector,
}

impl SummarizePipeline {
    pub fn new(
        collaborators: Collaborators,
        limiter: RateLimiter,
        sanitizer: TranscriptSanitizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            collaborators,
            limiter,
            sanitizer,
            settings,
            gates: DEFAULT_GATES.to_vec(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_gates(mut self, gates: Vec<Gate>) -> Self {
        self.gates = gates;
        self
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Admit, summarize and bill one request.
    pub async fn handle(&self, request: InboundRequest) -> Result<SummarizeResponse, ApiError> {
        let result = self.process(request).await;
        match &result {
            Ok(_) => self.metrics.record_completed().await,
            Err(err) => self.metrics.record_rejected(err.code).await,
        }
        result
    }

    /// Run every gate in order, stopping at the first failure.
    pub async fn admit(&self, request: &InboundRequest) -> Result<Admitted, ApiError> {
        let mut ctx = AdmissionContext::default();

        for &gate in &self.gates {
            if let Err(err) = self.run_gate(gate, request, &mut ctx).await {
                tracing::info!(
                    target: "verdict_gate::admission",
                    gate = gate.name(),
                    code = %err.code,
                    "Request rejected"
                );
                return Err(err);
            }
        }

        let (Some(user), Some(balance), Some(request)) = (ctx.user, ctx.balance, ctx.request) else {
            tracing::error!(
                target: "verdict_gate::admission",
                "Gate list finished without establishing user, balance and request"
            );
            return Err(ApiError::new(ErrorCode::Internal));
        };
        let video_id = extract_video_id(request.url.as_str())
            .ok_or_else(|| ApiError::new(ErrorCode::InvalidUrl))?
            .to_string();

        Ok(Admitted {
            user,
            balance,
            request,
            video_id,
        })
    }

    async fn run_gate(
        &self,
        gate: Gate,
        request: &InboundRequest,
        ctx: &mut AdmissionContext,
    ) -> Result<(), ApiError> {
        match gate {
            Gate::Authenticate => {
                let user = match self.collaborators.auth.current_user(&request.headers).await {
                    Ok(user) => user,
                    Err(e) => {
                        tracing::warn!(
                            target: "verdict_gate::admission",
                            error = %e,
                            "Auth provider failed; treating caller as anonymous"
                        );
                        None
                    }
                };
                ctx.user = Some(user.ok_or_else(|| ApiError::new(ErrorCode::Unauthorized))?);
            }
            Gate::ResolveProfile => {
                let user = ctx.user.as_ref().ok_or_else(|| missing(gate, "user"))?;
                let balance = match self.collaborators.ledger.balance(&user.id).await {
                    Ok(balance) => balance,
                    Err(e) => {
                        tracing::warn!(
                            target: "verdict_gate::admission",
                            user_id = %user.id,
                            error = %e,
                            "Credit lookup failed"
                        );
                        None
                    }
                };
                ctx.balance = Some(balance.ok_or_else(|| ApiError::new(ErrorCode::NotFound))?);
            }
            Gate::CheckCredits => {
                let balance = ctx.balance.ok_or_else(|| missing(gate, "balance"))?;
                if balance < self.settings.analysis_cost {
                    return Err(ApiError::insufficient_credits(balance));
                }
            }
            Gate::RateLimit => {
                let key = format!("summarize:{}", client_identity(&request.headers));
                match self.limiter.check(&key, &self.settings.rate_limit).await {
                    Ok(result) if !result.success => {
                        return Err(ApiError::rate_limited(result, self.limiter.now_ms()));
                    }
                    Ok(_) => {}
                    // Fail open on store outages.
                    Err(e) => tracing::warn!(
                        target: "verdict_gate::admission",
                        error = %e,
                        "Rate limit store unavailable; admitting request"
                    ),
                }
            }
            Gate::BodySize => {
                if request.body_too_large || request.declared_len() > self.settings.max_body_bytes {
                    return Err(ApiError::new(ErrorCode::PayloadTooLarge));
                }
            }
            Gate::ParseJson => {
                let body = serde_json::from_slice::<Value>(&request.body)
                    .ok()
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| ApiError::new(ErrorCode::InvalidJson))?;
                ctx.body = Some(body);
            }
            Gate::ValidateRequest => {
                let body = ctx.body.as_ref().ok_or_else(|| missing(gate, "body"))?;
                match validate_summarize_request(body) {
                    ValidationResult::Success(valid) => ctx.request = Some(valid),
                    ValidationResult::Failure(message) => {
                        return Err(ApiError::with_message(ErrorCode::InvalidUrl, message));
                    }
                }
            }
        }
        Ok(())
    }

    async fn process(&self, request: InboundRequest) -> Result<SummarizeResponse, ApiError> {
        let admitted = self.admit(&request).await?;
        let collaborators = &self.collaborators;
        let video_id = admitted.video_id.as_str();
        let url = admitted.request.url.as_str();

        let video = match tokio::time::timeout(
            self.settings.transcript_timeout,
            collaborators.transcripts.fetch_transcript_and_metadata(url),
        )
        .await
        {
            Ok(Ok(video)) => video,
            Ok(Err(e)) => {
                tracing::warn!(
                    target: "verdict_gate::admission",
                    video_id,
                    code = %e.code(),
                    error = %e,
                    "Transcript fetch failed"
                );
                return Err(ApiError::from_collaborator(&e, "Failed to fetch video data"));
            }
            Err(_) => {
                tracing::warn!(
                    target: "verdict_gate::admission",
                    video_id,
                    timeout_ms = self.settings.transcript_timeout.as_millis() as u64,
                    "Transcript fetch timed out"
                );
                return Err(ApiError::new(ErrorCode::RequestTimeout));
            }
        };

        if video.transcript.trim().is_empty() {
            return Err(ApiError::new(ErrorCode::TranscriptNotFound));
        }

        let transcript = self.sanitizer.sanitize(&video.transcript);
        let analysis = collaborators
            .summarizer
            .analyze(&transcript)
            .await
            .map_err(|e| {
                tracing::warn!(
                    target: "verdict_gate::admission",
                    video_id,
                    code = %e.code(),
                    error = %e,
                    "Analysis failed"
                );
                ApiError::from_collaborator(&e, "Failed to analyze video")
            })?;

        // Bookkeeping failures are logged; the analysis is still returned.
        let user_id = admitted.user.id.as_str();
        let cost = self.settings.analysis_cost;
        if let Err(e) = collaborators
            .ledger
            .deduct(user_id, cost, &format!("Analysis of video: {}", video_id))
            .await
        {
            tracing::error!(
                target: "verdict_gate::admission",
                user_id,
                video_id,
                error = %e,
                "Failed to deduct credits"
            );
        }

        let entry = HistoryEntry {
            user_id: user_id.to_string(),
            url: url.to_string(),
            video_id: video_id.to_string(),
            verdict: analysis.verdict,
            summary_text: analysis.summary_text(),
        };
        if let Err(e) = collaborators.history.append(entry).await {
            tracing::error!(
                target: "verdict_gate::admission",
                user_id,
                video_id,
                error = %e,
                "Failed to save analysis history"
            );
        }

        let credits_remaining = match collaborators.ledger.balance(user_id).await {
            Ok(Some(balance)) => balance,
            _ => admitted.balance - cost,
        };

        Ok(SummarizeResponse::new(video, analysis, credits_remaining))
    }
}
