use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};

use crate::error::{Error, Result};
use crate::identity::sanitize_key;
use crate::rate_limit_config::RateLimitConfig;
use crate::rate_limiter::{RateLimitResult, RateLimitStore};

/// Fixed-window step executed server-side so the check and the increment
/// cannot interleave across instances.
///
/// Returns `{count, pttl, admitted}`.
const FIXED_WINDOW_SCRIPT: &str = r#"
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count >= limit then
  return {count, redis.call('PTTL', KEYS[1]), 0}
end
count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], window)
  ttl = window
end
return {count, ttl, 1}
"#;

/// Shared counter store. Keys expire in Redis itself, so `sweep` is a no-op.
pub struct RedisStore {
    connection: MultiplexedConnection,
    script: Script,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| Error::Config(format!("Failed to create Redis client: {}", e)))?;
        let connection = client.get_multiplexed_tokio_connection().await?;

        Ok(Self {
            connection,
            script: Script::new(FIXED_WINDOW_SCRIPT),
            prefix: "verdict_gate:rate_limit".to_string(),
        })
    }

    fn key(&self, identity: &str) -> String {
        redis_key(&self.prefix, identity)
    }
}

fn redis_key(prefix: &str, identity: &str) -> String {
    format!("{}:{}", prefix, sanitize_key(identity))
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn hit(
        &self,
        identity: &str,
        config: &RateLimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitResult> {
        let mut conn = self.connection.clone();
        let (count, ttl, admitted): (i64, i64, i64) = self
            .script
            .key(self.key(identity))
            .arg(config.limit)
            .arg(config.window_ms())
            .invoke_async(&mut conn)
            .await?;

        let reset_time = now_ms.saturating_add(ttl.max(0) as u64);
        let limit = i64::from(config.limit);
        Ok(RateLimitResult {
            success: admitted == 1,
            limit: config.limit,
            remaining: if admitted == 1 {
                (limit - count).max(0) as u32
            } else {
                0
            },
            reset_time,
        })
    }

    async fn sweep(&self, _now_ms: u64) -> Result<usize> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
