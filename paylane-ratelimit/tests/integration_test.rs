//! Integration tests for paylane-ratelimit

use paylane_ratelimit::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const START: u64 = 1_700_000_000_000;

#[tokio::test]
async fn test_progressive_blocks_grow_until_capped() {
    let limiter = RateLimiter::builder()
        .fixed_window(1, Duration::from_secs(1))
        .violation_threshold(1)
        .base_block(Duration::from_secs(10 * 60 * 60))
        .build()
        .await
        .unwrap();

    let mut now = START;
    let mut previous = 0;
    for k in 1..=4u64 {
        limiter.check_at("198.51.100.23", None, now).await.unwrap();
        let denied = limiter.check_at("198.51.100.23", None, now).await.unwrap();
        let block = denied.block_until_ms.unwrap() - now;

        assert!(!denied.allowed);
        assert_eq!(denied.violation_count as u64, k);
        assert_eq!(
            block,
            (k * 10 * 60 * 60 * 1000).min(MAX_BLOCK.as_millis() as u64)
        );
        assert!(block >= previous);

        previous = block;
        now = denied.block_until_ms.unwrap();
    }
}

#[tokio::test]
async fn test_block_always_ends() {
    let limiter = RateLimiter::builder()
        .fixed_window(1, Duration::from_secs(60))
        .violation_threshold(1)
        .build()
        .await
        .unwrap();

    limiter.check_at("10.1.1.1", None, START).await.unwrap();
    let denied = limiter.check_at("10.1.1.1", None, START).await.unwrap();
    let until = denied.block_until_ms.unwrap();
    assert!(until > START);

    let after = limiter.check_at("10.1.1.1", None, until).await.unwrap();
    assert!(after.allowed);
    assert_eq!(after.violation_count, 1);
}

#[tokio::test]
async fn test_concurrent_checks_respect_cap() {
    let limiter = Arc::new(
        RateLimiter::builder()
            .fixed_window(25, Duration::from_secs(60))
            .violation_threshold(u32::MAX)
            .build()
            .await
            .unwrap(),
    );
    let allowed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..100 {
        let limiter = limiter.clone();
        let allowed = allowed.clone();
        handles.push(tokio::spawn(async move {
            let result = limiter.check_at("192.0.2.1", None, START).await.unwrap();
            if result.allowed {
                allowed.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(allowed.load(Ordering::SeqCst), 25);
    let entry = limiter.entry("192.0.2.1").await.unwrap().unwrap();
    assert_eq!(entry.violations, 75);
}

#[tokio::test]
async fn test_cleanup_keeps_blocked_and_live_entries() {
    let limiter = RateLimiter::builder()
        .fixed_window(1, Duration::from_secs(60))
        .violation_threshold(1)
        .base_block(Duration::from_secs(600))
        .build()
        .await
        .unwrap();

    limiter.check_at("idle", None, START).await.unwrap();
    limiter.check_at("blocked", None, START).await.unwrap();
    limiter.check_at("blocked", None, START).await.unwrap();
    limiter.check_at("live", None, START + 50_000).await.unwrap();

    let evicted = limiter.cleanup_at(START + 70_000).await.unwrap();
    assert_eq!(evicted, 1);
    assert!(limiter.entry("idle").await.unwrap().is_none());

    let blocked = limiter.check_at("blocked", None, START + 70_000).await.unwrap();
    assert!(!blocked.allowed);
    let live = limiter.check_at("live", None, START + 70_000).await.unwrap();
    assert!(!live.allowed);
}

#[tokio::test]
async fn test_skip_on_error_fails_open() {
    struct BrokenStore;

    #[async_trait::async_trait]
    impl RateLimitStore for BrokenStore {
        async fn check(
            &self,
            _key: &str,
            _policy: &RateLimitPolicy,
            _now_ms: u64,
        ) -> RateLimitResult<EntryDecision> {
            Err(RateLimitError::store("unreachable"))
        }

        async fn reset_violations(&self, _key: &str) -> RateLimitResult<bool> {
            Ok(false)
        }

        async fn reset(&self, _key: &str) -> RateLimitResult<()> {
            Ok(())
        }

        async fn entry(&self, _key: &str) -> RateLimitResult<Option<RateLimitEntry>> {
            Ok(None)
        }

        fn store_type(&self) -> &'static str {
            "broken"
        }
    }

    let strict = RateLimiter::builder()
        .store(Arc::new(BrokenStore))
        .build()
        .await
        .unwrap();
    assert!(matches!(
        strict.check("203.0.113.5").await,
        Err(RateLimitError::StoreError(_))
    ));

    let lenient = RateLimiter::builder()
        .store(Arc::new(BrokenStore))
        .skip_on_error(true)
        .build()
        .await
        .unwrap();
    assert!(lenient.check("203.0.113.5").await.unwrap().allowed);
}
