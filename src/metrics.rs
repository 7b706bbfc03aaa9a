use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ErrorCode;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionMetrics {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub rejected_requests: u64,
    pub rejections: BTreeMap<&'static str, u64>,
}

/// Counts pipeline outcomes for the health payload.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<RwLock<AdmissionMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_completed(&self) {
        let mut metrics = self.inner.write().await;
        metrics.total_requests += 1;
        metrics.completed_requests += 1;
    }

    pub async fn record_rejected(&self, code: ErrorCode) {
        let mut metrics = self.inner.write().await;
        metrics.total_requests += 1;
        metrics.rejected_requests += 1;
        *metrics.rejections.entry(code.as_str()).or_default() += 1;
    }

    pub async fn snapshot(&self) -> AdmissionMetrics {
        self.inner.read().await.clone()
    }
}
