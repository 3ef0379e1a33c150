//! # Paylane Rate Limiting
//!
//! Progressive fixed-window rate limiting for the public Paylane endpoints.
//!
//! ## Features
//!
//! - **Fixed Window**: `max_requests` per identifier per window, the window
//!   starting at the first request seen
//! - **Escalation**: repeat offenders are blocked for
//!   `min(violations * base_block, 24h)`
//! - **Storage Backends**: In-memory (DashMap) and Redis for distributed deployments
//! - **Key Extraction**: By IP, IP + endpoint, API key, or custom header
//! - **Standard Headers**: `X-RateLimit-Limit`, `X-RateLimit-Remaining`, `X-RateLimit-Reset`
//!
//! ## Quick Start
//!
//! ```rust
//! use paylane_ratelimit::RateLimiter;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let limiter = RateLimiter::builder()
//!     .fixed_window(100, Duration::from_secs(60))
//!     .violation_threshold(3)
//!     .base_block(Duration::from_secs(300))
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let result = limiter.check("203.0.113.5").await.unwrap();
//! if result.allowed {
//!     println!("Request allowed, {} remaining", result.remaining);
//! } else {
//!     println!("Rate limited, blocked until {:?}", result.block_until_ms);
//! }
//! # assert_eq!(result.remaining, 99);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod observer;
pub mod policy;
pub mod stores;

pub use config::{RateLimitConfig, RateLimiterBuilder};
pub use error::{RateLimitError, RateLimitHeaders, RateLimitResult};
pub use extractor::{KeyExtractor, RequestInfo};
pub use observer::{LoggingObserver, ViolationEvent, ViolationObserver};
pub use policy::{EntryDecision, MAX_BLOCK, RateLimitEntry, RateLimitPolicy};
pub use stores::{MemoryStore, RateLimitStore, StoreType};

#[cfg(feature = "redis")]
pub use stores::RedisStore;

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

/// Current wall-clock time in Unix milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitCheckResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum number of requests allowed per window
    pub limit: u64,
    /// Number of remaining requests in the current window
    pub remaining: u64,
    /// When the current window resets (Unix millis)
    pub reset_at_ms: u64,
    /// Cumulative violations for the identifier
    pub violation_count: u32,
    /// Active block end (Unix millis)
    pub block_until_ms: Option<u64>,
    /// Time until the client may retry (only when denied)
    pub retry_after: Option<Duration>,
}

impl RateLimitCheckResult {
    /// Result for a request that bypassed the limiter
    pub fn bypassed(limit: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_at_ms: 0,
            violation_count: 0,
            block_until_ms: None,
            retry_after: None,
        }
    }

    fn from_decision(decision: &EntryDecision, limit: u64, now_ms: u64) -> Self {
        let retry_after = if decision.allowed {
            None
        } else {
            let until = decision.block_until_ms.unwrap_or(decision.reset_at_ms);
            Some(Duration::from_millis(until.saturating_sub(now_ms)))
        };

        Self {
            allowed: decision.allowed,
            limit,
            remaining: decision.remaining,
            reset_at_ms: decision.reset_at_ms,
            violation_count: decision.violations,
            block_until_ms: decision.block_until_ms,
            retry_after,
        }
    }

    /// Response headers for this result
    pub fn headers(&self) -> RateLimitHeaders {
        match self.retry_after {
            Some(retry_after) if !self.allowed => RateLimitHeaders::denied(
                self.limit,
                self.reset_at_ms / 1000,
                retry_after.as_secs().max(1),
            ),
            _ => RateLimitHeaders::allowed(self.limit, self.remaining, self.reset_at_ms / 1000),
        }
    }

    /// Turn a denial into an error, passing allowed results through
    pub fn into_result(self) -> RateLimitResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(RateLimitError::from_denied(&self))
        }
    }
}

/// The main rate limiter
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl RateLimiter {
    /// Create a new rate limiter builder
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder::new()
    }

    /// Create a new rate limiter with the given store
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        config: RateLimitConfig,
        observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        debug!(
            policy = %config.policy.description(),
            store = store.store_type(),
            "Creating new rate limiter"
        );
        Self {
            store,
            config,
            observer,
        }
    }

    /// Check if a request with the given key is allowed
    pub async fn check(&self, key: &str) -> RateLimitResult<RateLimitCheckResult> {
        self.check_at(key, None, now_ms()).await
    }

    /// Check a request against an endpoint, keeping the endpoint for notifications
    pub async fn check_endpoint(
        &self,
        key: &str,
        endpoint: &str,
    ) -> RateLimitResult<RateLimitCheckResult> {
        self.check_at(key, Some(endpoint), now_ms()).await
    }

    /// Extract the key from a request and check it
    pub async fn check_request(
        &self,
        request: &RequestInfo,
    ) -> RateLimitResult<RateLimitCheckResult> {
        let key = self.config.key_extractor.extract(request).ok_or_else(|| {
            RateLimitError::key_extraction(format!(
                "no {} on request to {}",
                self.config.key_extractor.description(),
                request.path
            ))
        })?;

        self.check_at(&key, Some(&request.path), now_ms()).await
    }

    /// Check a request at an explicit point in time
    pub async fn check_at(
        &self,
        key: &str,
        endpoint: Option<&str>,
        now_ms: u64,
    ) -> RateLimitResult<RateLimitCheckResult> {
        trace!(key = %key, "Checking rate limit");

        let policy = &self.config.policy;
        if self.config.should_bypass(key) {
            trace!(key = %key, "Key bypasses rate limiting");
            return Ok(RateLimitCheckResult::bypassed(policy.max_requests));
        }

        let decision = match self.store.check(key, policy, now_ms).await {
            Ok(decision) => decision,
            Err(e) if self.config.skip_on_error => {
                warn!(key = %key, error = %e, "Rate limit store failed, allowing request");
                return Ok(RateLimitCheckResult::bypassed(policy.max_requests));
            }
            Err(e) => return Err(e),
        };

        if decision.allowed {
            trace!(key = %key, remaining = decision.remaining, "Request allowed");
        } else if decision.violation_recorded {
            warn!(
                key = %key,
                endpoint = ?endpoint,
                violations = decision.violations,
                block_until_ms = ?decision.block_until_ms,
                "Request over the limit"
            );
            self.notify(key, endpoint, &decision, now_ms);
        } else {
            debug!(key = %key, block_until_ms = ?decision.block_until_ms, "Request from blocked key");
        }

        Ok(RateLimitCheckResult::from_decision(
            &decision,
            policy.max_requests,
            now_ms,
        ))
    }

    fn notify(&self, key: &str, endpoint: Option<&str>, decision: &EntryDecision, now_ms: u64) {
        let Some(observer) = &self.observer else {
            return;
        };

        observer.on_violation(&ViolationEvent {
            identifier: key.to_string(),
            endpoint: endpoint.map(str::to_string),
            violation_count: decision.violations,
            block_until_ms: decision.block_until_ms,
            block_started: decision.block_started,
            at_ms: now_ms,
        });
    }

    /// Clear the violation count and any block for a key
    ///
    /// Returns `false` when the limiter holds no state for the key.
    pub async fn reset_violations(&self, key: &str) -> RateLimitResult<bool> {
        debug!(key = %key, "Resetting rate limit violations");
        self.store.reset_violations(key).await
    }

    /// Reset the rate limit for a key
    pub async fn reset(&self, key: &str) -> RateLimitResult<()> {
        debug!(key = %key, "Resetting rate limit");
        self.store.reset(key).await
    }

    /// Current state of a key
    pub async fn entry(&self, key: &str) -> RateLimitResult<Option<RateLimitEntry>> {
        self.store.entry(key).await
    }

    /// Evict entries whose window and block have both ended
    pub async fn cleanup(&self) -> RateLimitResult<usize> {
        self.cleanup_at(now_ms()).await
    }

    /// Evict entries that are idle at `now_ms`
    pub async fn cleanup_at(&self, now_ms: u64) -> RateLimitResult<usize> {
        let evicted = self.store.cleanup(now_ms).await?;
        if evicted > 0 {
            debug!(evicted, "Evicted idle rate limit entries");
        }
        Ok(evicted)
    }

    /// Get the configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get the active policy
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.config.policy
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store.store_type())
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const CLIENT: &str = "203.0.113.5";
    const START: u64 = 1_700_000_000_000;

    async fn limiter(max_requests: u64) -> RateLimiter {
        RateLimiter::builder()
            .fixed_window(max_requests, Duration::from_secs(60))
            .violation_threshold(3)
            .base_block(Duration::from_secs(60))
            .build()
            .await
            .unwrap()
    }

    async fn burst(limiter: &RateLimiter, now: u64, count: usize) -> Vec<RateLimitCheckResult> {
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            results.push(limiter.check_at(CLIENT, None, now).await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn test_first_breach_counts_one_violation() {
        let limiter = limiter(100).await;
        let results = burst(&limiter, START, 101).await;

        assert!(results[..100].iter().all(|r| r.allowed));
        assert_eq!(results[99].remaining, 0);

        let denied = &results[100];
        assert!(!denied.allowed);
        assert_eq!(denied.violation_count, 1);
        assert_eq!(denied.block_until_ms, None);
        assert_eq!(denied.retry_after, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_third_breach_blocks() {
        let limiter = limiter(100).await;
        let window = 60_000;

        burst(&limiter, START, 101).await;
        burst(&limiter, START + window, 101).await;
        let third = burst(&limiter, START + 2 * window, 101).await;

        let breach_at = START + 2 * window;
        let denied = third.last().unwrap();
        assert_eq!(denied.violation_count, 3);
        assert_eq!(denied.block_until_ms, Some(breach_at + 3 * 60_000));

        let later = limiter.check_at(CLIENT, None, breach_at + 1_000).await.unwrap();
        assert!(!later.allowed);
        assert_eq!(later.block_until_ms, Some(breach_at + 180_000));
        assert_eq!(later.violation_count, 3);
        assert_eq!(later.retry_after, Some(Duration::from_secs(179)));
    }

    #[tokio::test]
    async fn test_reset_violations_unblocks() {
        let limiter = limiter(1).await;
        for round in 0..3 {
            burst(&limiter, START + round * 60_000, 2).await;
        }
        let blocked = limiter.check_at(CLIENT, None, START + 121_000).await.unwrap();
        assert!(!blocked.allowed);

        assert!(limiter.reset_violations(CLIENT).await.unwrap());
        let entry = limiter.entry(CLIENT).await.unwrap().unwrap();
        assert_eq!(entry.violations, 0);
        assert_eq!(entry.block_until_ms, None);

        let result = limiter.check_at(CLIENT, None, START + 181_000).await.unwrap();
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn test_reset_violations_unknown_key() {
        let limiter = limiter(5).await;
        assert!(!limiter.reset_violations("198.51.100.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_different_keys() {
        let limiter = limiter(2).await;

        burst(&limiter, START, 3).await;
        let other = limiter.check_at("198.51.100.9", None, START).await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 1);
    }

    #[tokio::test]
    async fn test_bypass_key() {
        let limiter = RateLimiter::builder()
            .fixed_window(1, Duration::from_secs(60))
            .bypass_key("10.0.0.1")
            .build()
            .await
            .unwrap();

        for _ in 0..5 {
            assert!(limiter.check("10.0.0.1").await.unwrap().allowed);
        }
        assert!(limiter.entry("10.0.0.1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_observer_receives_violations() {
        let events: Arc<Mutex<Vec<ViolationEvent>>> = Arc::default();
        let sink = events.clone();
        let limiter = RateLimiter::builder()
            .fixed_window(1, Duration::from_secs(60))
            .violation_threshold(2)
            .observer(Arc::new(move |event: &ViolationEvent| {
                sink.lock().push(event.clone())
            }))
            .build()
            .await
            .unwrap();

        limiter.check_at(CLIENT, Some("/v1/sessions"), START).await.unwrap();
        limiter.check_at(CLIENT, Some("/v1/sessions"), START).await.unwrap();
        limiter.check_at(CLIENT, Some("/v1/sessions"), START + 1).await.unwrap();
        // Blocked requests are not new violations
        limiter.check_at(CLIENT, Some("/v1/sessions"), START + 2).await.unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].violation_count, 1);
        assert!(!events[0].block_started);
        assert_eq!(events[0].endpoint.as_deref(), Some("/v1/sessions"));
        assert!(events[1].block_started);
        assert_eq!(events[1].block_until_ms, Some(START + 1 + 2 * 300_000));
    }

    #[tokio::test]
    async fn test_check_request_uses_extractor() {
        let limiter = RateLimiter::builder()
            .fixed_window(1, Duration::from_secs(60))
            .key_extractor(KeyExtractor::IpAndPath)
            .build()
            .await
            .unwrap();

        let request = RequestInfo::new("/v1/sessions", "POST").with_header("X-Real-IP", CLIENT);
        assert!(limiter.check_request(&request).await.unwrap().allowed);
        assert!(!limiter.check_request(&request).await.unwrap().allowed);

        let entry = limiter.entry("203.0.113.5:/v1/sessions").await.unwrap();
        assert!(entry.is_some());

        let anonymous = RequestInfo::new("/v1/sessions", "POST");
        assert!(matches!(
            limiter.check_request(&anonymous).await,
            Err(RateLimitError::KeyExtractionError(_))
        ));
    }

    #[tokio::test]
    async fn test_denied_result_headers() {
        let limiter = limiter(1).await;
        let results = burst(&limiter, START, 2).await;

        let headers = results[1].headers();
        assert_eq!(headers.remaining, 0);
        assert_eq!(headers.retry_after, Some(60));
        assert!(results[1].clone().into_result().unwrap_err().is_limit_exceeded());
        assert!(results[0].clone().into_result().is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_at() {
        let limiter = limiter(5).await;
        limiter.check_at(CLIENT, None, START).await.unwrap();

        assert_eq!(limiter.cleanup_at(START + 1_000).await.unwrap(), 0);
        assert_eq!(limiter.cleanup_at(START + 60_000).await.unwrap(), 1);
        assert!(limiter.entry(CLIENT).await.unwrap().is_none());
    }
}
