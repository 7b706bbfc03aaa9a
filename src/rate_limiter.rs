use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::rate_limit_config::RateLimitConfig;

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Counter state for one identity inside the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: u64,
}

impl RateLimitEntry {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.reset_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: u64,
}

/// Backing storage for fixed-window counters.
///
/// `hit` must perform the lookup, the limit check and the increment as one
/// atomic step for a given identity.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(
        &self,
        identity: &str,
        config: &RateLimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitResult>;

    /// Remove every entry whose window has ended. Returns how many went.
    async fn sweep(&self, now_ms: u64) -> Result<usize>;

    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-local store. Each instance in a multi-node deployment keeps its
/// own view, so the effective global limit is `limit * instances`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, identity: &str) -> Option<RateLimitEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(identity).copied())
    }

    fn lock_err() -> Error {
        Error::Internal("Failed to acquire lock on rate limit entries".to_string())
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(
        &self,
        identity: &str,
        config: &RateLimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitResult> {
        let mut entries = self.entries.lock().map_err(|_| Self::lock_err())?;

        match entries.get_mut(identity) {
            Some(entry) if !entry.is_expired(now_ms) => {
                if entry.count >= config.limit {
                    return Ok(RateLimitResult {
                        success: false,
                        limit: config.limit,
                        remaining: 0,
                        reset_time: entry.reset_time,
                    });
                }
                entry.count += 1;
                Ok(RateLimitResult {
                    success: true,
                    limit: config.limit,
                    remaining: config.limit - entry.count,
                    reset_time: entry.reset_time,
                })
            }
            _ => {
                let entry = RateLimitEntry {
                    count: 1,
                    reset_time: now_ms.saturating_add(config.window_ms()),
                };
                entries.insert(identity.to_string(), entry);
                Ok(RateLimitResult {
                    success: true,
                    limit: config.limit,
                    remaining: config.limit.saturating_sub(1),
                    reset_time: entry.reset_time,
                })
            }
        }
    }

    async fn sweep(&self, now_ms: u64) -> Result<usize> {
        let mut entries = self.entries.lock().map_err(|_| Self::lock_err())?;
        let initial_count = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_ms));
        Ok(initial_count - entries.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Fixed-window rate limiter over a pluggable store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    pub async fn check(&self, identity: &str, config: &RateLimitConfig) -> Result<RateLimitResult> {
        let result = self.store.hit(identity, config, self.now_ms()).await?;
        if !result.success {
            tracing::debug!(
                target: "verdict_gate::rate_limiter",
                identity = %identity,
                limit = result.limit,
                reset_time = result.reset_time,
                "Rate limit exhausted"
            );
        }
        Ok(result)
    }

    pub async fn sweep(&self) -> Result<usize> {
        self.store.sweep(self.now_ms()).await
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Run `sweep` every `period` on its own task, independent of request
    /// handling.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match limiter.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(
                        target: "verdict_gate::rate_limiter",
                        removed,
                        "Swept expired rate limit entries"
                    ),
                    Err(e) => tracing::warn!(
                        target: "verdict_gate::rate_limiter",
                        error = %e,
                        "Rate limit sweep failed"
                    ),
                }
            }
        })
    }
}
