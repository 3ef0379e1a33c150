//! Rate limit storage backends
//!
//! This module provides different storage backends for rate limiting:
//!
//! - **Memory**: In-memory storage using DashMap (default, single-instance)
//! - **Redis**: Distributed storage for multi-instance deployments
//!
//! Every backend must apply a request to a key's entry atomically. Two
//! concurrent requests for the same key must never both observe "under the
//! cap".

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisStore;

use crate::error::RateLimitResult;
use crate::policy::{EntryDecision, RateLimitEntry, RateLimitPolicy};
use async_trait::async_trait;

/// Store type for rate limiting
#[derive(Debug, Clone, Default)]
pub enum StoreType {
    /// In-memory store (single instance only)
    #[default]
    Memory,
    /// Redis store (distributed)
    Redis,
}

/// Trait for rate limit storage backends
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically apply one request for `key` at `now_ms` under `policy`
    async fn check(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now_ms: u64,
    ) -> RateLimitResult<EntryDecision>;

    /// Clear violations and any block for a key.
    /// Returns whether the key was known.
    async fn reset_violations(&self, key: &str) -> RateLimitResult<bool>;

    /// Drop all state for a key
    async fn reset(&self, key: &str) -> RateLimitResult<()>;

    /// Read the current entry for a key, if any
    async fn entry(&self, key: &str) -> RateLimitResult<Option<RateLimitEntry>>;

    /// Evict entries whose window and block have both expired.
    /// Returns the number of evicted entries.
    async fn cleanup(&self, _now_ms: u64) -> RateLimitResult<usize> {
        Ok(0)
    }

    /// Get store type name for debugging
    fn store_type(&self) -> &'static str;
}
