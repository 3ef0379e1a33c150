//! Error types for rate limiting

use crate::RateLimitCheckResult;
use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {retry_after:?}")]
    LimitExceeded {
        /// Total limit
        limit: u64,
        /// When the window resets (Unix millis)
        reset_at_ms: u64,
        /// Time to wait before retrying
        retry_after: Duration,
        /// Cumulative violations for the key
        violations: u32,
        /// Active block end (Unix millis), if the key is blocked
        block_until_ms: Option<u64>,
    },

    /// Store error (Redis, memory, etc.)
    #[error("Rate limit store error: {0}")]
    StoreError(String),

    /// Configuration error
    #[error("Rate limit configuration error: {0}")]
    ConfigError(String),

    /// Key extraction failed
    #[error("Failed to extract rate limit key: {0}")]
    KeyExtractionError(String),

    /// Redis connection error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl RateLimitError {
    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::StoreError(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new key extraction error
    pub fn key_extraction<S: Into<String>>(msg: S) -> Self {
        Self::KeyExtractionError(msg.into())
    }

    /// Convert a denied check into an error
    pub fn from_denied(result: &RateLimitCheckResult) -> Self {
        Self::LimitExceeded {
            limit: result.limit,
            reset_at_ms: result.reset_at_ms,
            retry_after: result.retry_after.unwrap_or_default(),
            violations: result.violation_count,
            block_until_ms: result.block_until_ms,
        }
    }

    /// Check if this error is a rate limit exceeded error
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. })
    }

    /// Get the retry-after duration if this is a limit exceeded error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Get rate limit headers for HTTP response
    pub fn headers(&self) -> Option<RateLimitHeaders> {
        match self {
            Self::LimitExceeded {
                limit,
                reset_at_ms,
                retry_after,
                ..
            } => Some(RateLimitHeaders::denied(
                *limit,
                reset_at_ms / 1000,
                retry_after.as_secs().max(1),
            )),
            _ => None,
        }
    }
}

/// Standard rate limit headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// X-RateLimit-Limit: Maximum requests allowed
    pub limit: u64,
    /// X-RateLimit-Remaining: Requests remaining in current window
    pub remaining: u64,
    /// X-RateLimit-Reset: Unix timestamp (seconds) when the limit resets
    pub reset: u64,
    /// Retry-After: Seconds until the client should retry (only when limited)
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    /// Create headers for an allowed request
    pub fn allowed(limit: u64, remaining: u64, reset: u64) -> Self {
        Self {
            limit,
            remaining,
            reset,
            retry_after: None,
        }
    }

    /// Create headers for a denied request
    pub fn denied(limit: u64, reset: u64, retry_after: u64) -> Self {
        Self {
            limit,
            remaining: 0,
            reset,
            retry_after: Some(retry_after),
        }
    }

    /// Get header name/value pairs
    pub fn to_header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset.to_string()),
        ];

        if let Some(retry) = self.retry_after {
            headers.push(("Retry-After", retry.to_string()));
        }

        headers
    }
}
