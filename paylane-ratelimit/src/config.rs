//! Rate limiter configuration and builder

use crate::RateLimiter;
use crate::error::{RateLimitError, RateLimitResult};
use crate::extractor::KeyExtractor;
use crate::observer::ViolationObserver;
use crate::policy::RateLimitPolicy;
use crate::stores::{MemoryStore, RateLimitStore, StoreType};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window, cap and escalation settings
    pub policy: RateLimitPolicy,
    /// Store type (memory, redis, etc.)
    pub store_type: StoreType,
    /// How client identifiers are derived from requests
    pub key_extractor: KeyExtractor,
    /// Allow requests when the store fails
    pub skip_on_error: bool,
    /// Custom error message when rate limited
    pub error_message: Option<String>,
    /// Bypass keys (these keys will never be rate limited)
    pub bypass_keys: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            policy: RateLimitPolicy::default(),
            store_type: StoreType::Memory,
            key_extractor: KeyExtractor::Ip,
            skip_on_error: false,
            error_message: None,
            bypass_keys: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new configuration builder
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder::new()
    }

    /// Check if a key should bypass rate limiting
    pub fn should_bypass(&self, key: &str) -> bool {
        self.bypass_keys.iter().any(|k| k == key)
    }

    /// Reject settings the limiter cannot run with
    pub fn validate(&self) -> RateLimitResult<()> {
        if self.policy.max_requests == 0 {
            return Err(RateLimitError::config("Max requests must be greater than 0"));
        }
        if self.policy.window.is_zero() {
            return Err(RateLimitError::config("Window must be non-zero"));
        }
        if self.policy.violation_threshold == 0 {
            return Err(RateLimitError::config(
                "Violation threshold must be greater than 0",
            ));
        }
        if self.policy.max_block < self.policy.base_block {
            return Err(RateLimitError::config(
                "Maximum block must not be shorter than the base block",
            ));
        }
        Ok(())
    }
}

/// Builder for creating a RateLimiter
pub struct RateLimiterBuilder {
    config: RateLimitConfig,
    observer: Option<Arc<dyn ViolationObserver>>,
    store: Option<Arc<dyn RateLimitStore>>,
    #[cfg(feature = "redis")]
    redis_url: Option<String>,
}

impl RateLimiterBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
            observer: None,
            store: None,
            #[cfg(feature = "redis")]
            redis_url: None,
        }
    }

    /// Replace the whole policy
    pub fn policy(mut self, policy: RateLimitPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the window length and request cap
    pub fn fixed_window(mut self, max_requests: u64, window: Duration) -> Self {
        self.config.policy.max_requests = max_requests;
        self.config.policy.window = window;
        self
    }

    /// Set how many violations trigger a block
    pub fn violation_threshold(mut self, threshold: u32) -> Self {
        self.config.policy.violation_threshold = threshold;
        self
    }

    /// Set the block length per violation
    pub fn base_block(mut self, base_block: Duration) -> Self {
        self.config.policy.base_block = base_block;
        self
    }

    /// Set the longest possible block
    pub fn max_block(mut self, max_block: Duration) -> Self {
        self.config.policy.max_block = max_block;
        self
    }

    /// Use in-memory store (default)
    pub fn memory_store(mut self) -> Self {
        self.config.store_type = StoreType::Memory;
        self
    }

    /// Use Redis store for distributed rate limiting
    #[cfg(feature = "redis")]
    pub fn redis_store(mut self, url: &str) -> Self {
        self.config.store_type = StoreType::Redis;
        self.redis_url = Some(url.to_string());
        self
    }

    /// Use an already constructed store
    pub fn store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the key extraction strategy
    pub fn key_extractor(mut self, extractor: KeyExtractor) -> Self {
        self.config.key_extractor = extractor;
        self
    }

    /// Let requests through when the store fails
    pub fn skip_on_error(mut self, skip: bool) -> Self {
        self.config.skip_on_error = skip;
        self
    }

    /// Set custom error message when rate limited
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.config.error_message = Some(message.into());
        self
    }

    /// Add a key that should bypass rate limiting
    pub fn bypass_key(mut self, key: impl Into<String>) -> Self {
        self.config.bypass_keys.push(key.into());
        self
    }

    /// Add multiple keys that should bypass rate limiting
    pub fn bypass_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config
            .bypass_keys
            .extend(keys.into_iter().map(|k| k.into()));
        self
    }

    /// Notify an observer about violations and blocks
    pub fn observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the rate limiter
    pub async fn build(self) -> RateLimitResult<RateLimiter> {
        self.config.validate()?;

        debug!(
            policy = %self.config.policy.description(),
            store_type = ?self.config.store_type,
            "Building rate limiter"
        );

        let store: Arc<dyn RateLimitStore> = match (self.store, &self.config.store_type) {
            (Some(store), _) => store,
            (None, StoreType::Memory) => Arc::new(MemoryStore::new()),
            #[cfg(feature = "redis")]
            (None, StoreType::Redis) => {
                let url = self.redis_url.as_deref().ok_or_else(|| {
                    RateLimitError::config("Redis URL must be specified for Redis store")
                })?;
                Arc::new(crate::stores::RedisStore::new(url).await?)
            }
            #[cfg(not(feature = "redis"))]
            (None, StoreType::Redis) => {
                return Err(RateLimitError::config(
                    "Redis feature is not enabled. Add `redis` feature to use Redis store.",
                ));
            }
        };

        Ok(RateLimiter::new(store, self.config, self.observer))
    }
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
