//! Redis rate limit store
//!
//! Uses Redis for distributed rate limiting across multiple instances.
//! Requires the `redis` feature to be enabled.
//!
//! Each key is a hash with `count`, `reset`, `violations` and `block` fields.
//! A Lua script applies the whole progressive policy in one round trip, so
//! the read-check-increment is atomic across every instance sharing the
//! server. Hashes expire once both their window and their block are over.

use crate::error::{RateLimitError, RateLimitResult};
use crate::policy::{EntryDecision, RateLimitEntry, RateLimitPolicy};
use crate::stores::RateLimitStore;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tracing::{debug, trace};

const CHECK_SCRIPT: &str = r#"
local key = KEYS[1]
local max_requests = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local threshold = tonumber(ARGV[3])
local base_block = tonumber(ARGV[4])
local max_block = tonumber(ARGV[5])
local now = tonumber(ARGV[6])

local data = redis.call('HMGET', key, 'count', 'reset', 'violations', 'block')
local count = tonumber(data[1]) or 0
local reset = tonumber(data[2]) or 0
local violations = tonumber(data[3]) or 0
local block = tonumber(data[4]) or 0

local function persist()
    redis.call('HSET', key, 'count', count, 'reset', reset, 'violations', violations, 'block', block)
    local live_until = math.max(reset, block)
    redis.call('PEXPIRE', key, math.max(live_until - now, 0) + window_ms)
end

if block > now then
    return {0, 0, reset, violations, block, 0, 0}
end
block = 0

if now >= reset then
    count = 1
    reset = now + window_ms
    persist()
    return {1, max_requests - count, reset, violations, 0, 0, 0}
end

if count < max_requests then
    count = count + 1
    persist()
    return {1, max_requests - count, reset, violations, 0, 0, 0}
end

violations = violations + 1
local started = 0
if violations >= threshold then
    block = now + math.min(violations * base_block, max_block)
    started = 1
end
persist()
return {0, 0, reset, violations, block, 1, started}
"#;

const RESET_VIOLATIONS_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[1], 'violations', 0, 'block', 0)
return 1
"#;

/// Redis-backed rate limit store
///
/// Supports distributed rate limiting across multiple application instances.
/// Uses Lua scripts for atomic operations.
pub struct RedisStore {
    /// Redis connection manager
    conn: ConnectionManager,
    /// Key prefix
    prefix: String,
}

impl RedisStore {
    /// Create a new Redis store
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn new(url: &str) -> RateLimitResult<Self> {
        debug!(url = %url, "Connecting to Redis for rate limiting");

        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            prefix: "ratelimit".to_string(),
        })
    }

    /// Create a new Redis store with a custom prefix
    pub async fn with_prefix(url: &str, prefix: impl Into<String>) -> RateLimitResult<Self> {
        let mut store = Self::new(url).await?;
        store.prefix = prefix.into();
        Ok(store)
    }

    /// Get the full key with prefix
    fn key(&self, suffix: &str) -> String {
        format!("{}:pfw:{}", self.prefix, suffix)
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn check(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now_ms: u64,
    ) -> RateLimitResult<EntryDecision> {
        trace!(key = %key, max_requests = policy.max_requests, "Redis fixed window check");

        let script = redis::Script::new(CHECK_SCRIPT);
        let mut conn = self.conn.clone();
        let result: Vec<i64> = script
            .key(self.key(key))
            .arg(policy.max_requests)
            .arg(policy.window_ms())
            .arg(policy.violation_threshold)
            .arg(policy.base_block.as_millis() as u64)
            .arg(policy.max_block.as_millis() as u64)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::store(e.to_string()))?;

        if result.len() != 7 {
            return Err(RateLimitError::store(format!(
                "Unexpected script reply with {} fields",
                result.len()
            )));
        }

        let decision = EntryDecision {
            allowed: result[0] == 1,
            remaining: result[1].max(0) as u64,
            reset_at_ms: result[2].max(0) as u64,
            violations: result[3].clamp(0, u32::MAX as i64) as u32,
            block_until_ms: (result[4] > now_ms as i64).then_some(result[4] as u64),
            violation_recorded: result[5] == 1,
            block_started: result[6] == 1,
        };

        trace!(key = %key, allowed = decision.allowed, "Redis fixed window: decided");

        Ok(decision)
    }

    async fn reset_violations(&self, key: &str) -> RateLimitResult<bool> {
        debug!(key = %key, "Clearing violations in Redis");

        let script = redis::Script::new(RESET_VIOLATIONS_SCRIPT);
        let mut conn = self.conn.clone();
        let cleared: i64 = script
            .key(self.key(key))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::store(e.to_string()))?;

        Ok(cleared == 1)
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()> {
        debug!(key = %key, "Resetting rate limit state in Redis");

        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.key(key))
            .await
            .map_err(|e| RateLimitError::store(e.to_string()))?;

        Ok(())
    }

    async fn entry(&self, key: &str) -> RateLimitResult<Option<RateLimitEntry>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, u64> = conn
            .hgetall(self.key(key))
            .await
            .map_err(|e| RateLimitError::store(e.to_string()))?;

        if fields.is_empty() {
            return Ok(None);
        }

        let field = |name: &str| fields.get(name).copied().unwrap_or_default();
        Ok(Some(RateLimitEntry {
            count: field("count"),
            window_reset_ms: field("reset"),
            violations: field("violations").min(u32::MAX as u64) as u32,
            block_until_ms: Some(field("block")).filter(|block| *block > 0),
        }))
    }

    async fn cleanup(&self, _now_ms: u64) -> RateLimitResult<usize> {
        debug!("Redis cleanup is automatic via TTL");
        Ok(0)
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}
