//! In-memory rate limit store
//!
//! Uses DashMap for thread-safe concurrent access. The entry API holds the
//! shard lock for the duration of a check, which makes read-check-increment
//! atomic per key. Suitable for single-instance deployments or testing. For
//! distributed deployments, use the Redis store.

use crate::error::RateLimitResult;
use crate::policy::{EntryDecision, RateLimitEntry, RateLimitPolicy};
use crate::stores::RateLimitStore;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

/// In-memory rate limit store
pub struct MemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        debug!("Creating new in-memory rate limit store");
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get the number of tracked keys (for monitoring)
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now_ms: u64,
    ) -> RateLimitResult<EntryDecision> {
        trace!(key = %key, max_requests = policy.max_requests, "Fixed window check");

        let mut entry = self.entries.entry(key.to_string()).or_default();
        let decision = entry.apply(policy, now_ms);

        trace!(
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            violations = decision.violations,
            "Fixed window: decided"
        );

        Ok(decision)
    }

    async fn reset_violations(&self, key: &str) -> RateLimitResult<bool> {
        debug!(key = %key, "Clearing violations");
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.clear_violations();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()> {
        debug!(key = %key, "Resetting rate limit state");
        self.entries.remove(key);
        Ok(())
    }

    async fn entry(&self, key: &str) -> RateLimitResult<Option<RateLimitEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn cleanup(&self, now_ms: u64) -> RateLimitResult<usize> {
        debug!("Cleaning up expired entries");

        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        let evicted = before.saturating_sub(self.entries.len());

        debug!(evicted = evicted, key_count = self.key_count(), "Cleanup complete");

        Ok(evicted)
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy(max_requests: u64) -> RateLimitPolicy {
        RateLimitPolicy::new(max_requests, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_fixed_window() {
        let store = MemoryStore::new();
        let policy = policy(3);

        for i in (0..3).rev() {
            let decision = store.check("test", &policy, 1_000).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, i);
        }

        let decision = store.check("test", &policy, 1_000).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.violations, 1);
    }

    #[tokio::test]
    async fn test_different_keys() {
        let store = MemoryStore::new();
        let policy = policy(1);

        store.check("key1", &policy, 0).await.unwrap();
        let decision = store.check("key1", &policy, 0).await.unwrap();
        assert!(!decision.allowed);

        let decision = store.check("key2", &policy, 0).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_reset_violations() {
        let store = MemoryStore::new();
        let policy = policy(1).with_violation_threshold(1);

        store.check("test", &policy, 0).await.unwrap();
        let decision = store.check("test", &policy, 0).await.unwrap();
        assert!(decision.block_until_ms.is_some());

        assert!(store.reset_violations("test").await.unwrap());
        let entry = store.entry("test").await.unwrap().unwrap();
        assert_eq!(entry.violations, 0);
        assert_eq!(entry.block_until_ms, None);

        assert!(!store.reset_violations("unknown").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset() {
        let store = MemoryStore::new();
        let policy = policy(1);

        store.check("test", &policy, 0).await.unwrap();
        store.reset("test").await.unwrap();

        assert!(store.entry("test").await.unwrap().is_none());
        assert!(store.check("test", &policy, 0).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_entries() {
        let store = MemoryStore::new();
        let policy = policy(1).with_violation_threshold(1);

        // Window live until 60_000
        store.check("live", &policy, 0).await.unwrap();

        // Blocked until well after the window ends
        store.check("blocked", &policy, 0).await.unwrap();
        store.check("blocked", &policy, 0).await.unwrap();

        // Window long gone
        store.check("stale", &policy, 0).await.unwrap();

        let evicted = store.cleanup(30_000).await.unwrap();
        assert_eq!(evicted, 0);
        assert_eq!(store.key_count(), 3);

        let evicted = store.cleanup(90_000).await.unwrap();
        assert_eq!(evicted, 2);
        assert!(store.entry("blocked").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_checks_respect_cap() {
        let store = Arc::new(MemoryStore::new());
        let policy = Arc::new(policy(50).with_violation_threshold(u32::MAX));

        let mut handles = Vec::new();
        for _ in 0..200 {
            let store = Arc::clone(&store);
            let policy = Arc::clone(&policy);
            handles.push(tokio::spawn(async move {
                store.check("shared", &policy, 1_000).await.unwrap().allowed
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 50);
        let entry = store.entry("shared").await.unwrap().unwrap();
        assert_eq!(entry.violations, 150);
    }

    #[test]
    fn test_store_type() {
        let store = MemoryStore::new();
        assert_eq!(store.store_type(), "memory");
    }
}
