use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::admission::{InboundRequest, SummarizePipeline};
use crate::error::ApiError;
use crate::health::{HealthChecker, HealthStatus};
use crate::identity::client_identity;
use crate::rate_limit_config::RouteLimits;
use crate::response::SummarizeResponse;

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pipeline: SummarizePipeline,
    pub health: HealthChecker,
    pub limits: RouteLimits,
}

impl AppState {
    pub fn new(pipeline: SummarizePipeline, limits: RouteLimits) -> Self {
        let health = HealthChecker::new(pipeline.limiter().clone(), limits);
        Self {
            pipeline,
            health,
            limits,
        }
    }
}

/// `POST /summarize`
pub async fn summarize(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let response = state
        .pipeline
        .handle(InboundRequest::from_extracted(headers, body))
        .await?;
    Ok(Json(response))
}

/// `GET /summarize`
pub async fn health_check(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<HealthStatus>, ApiError> {
    let limiter = state.pipeline.limiter();
    let key = format!("health:{}", client_identity(&headers));
    match limiter.check(&key, &state.limits.health).await {
        Ok(result) if !result.success => {
            return Err(ApiError::rate_limited(result, limiter.now_ms()));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(
            target: "verdict_gate::handlers",
            error = %e,
            "Rate limit store unavailable; serving health probe"
        ),
    }

    let admissions = state.pipeline.metrics().snapshot().await;
    Ok(Json(state.health.check_health(admissions).await))
}
