//! Progressive fixed window policy
//!
//! Time is divided into fixed windows that start at the first request seen
//! for a key. Requests within the window are counted; once the count reaches
//! `max_requests`, every further request in the same window is a *violation*.
//!
//! ## Escalation
//!
//! Violations accumulate across windows. When the cumulative count reaches
//! `violation_threshold`, the key is blocked for
//! `min(violations * base_block, max_block)`. Every later violation recomputes
//! the block from the new count, so repeat offenders wait longer, but a block
//! always ends.
//!
//! ```rust
//! use paylane_ratelimit::{RateLimitEntry, RateLimitPolicy};
//! use std::time::Duration;
//!
//! let policy = RateLimitPolicy::new(2, Duration::from_secs(60));
//! let mut entry = RateLimitEntry::default();
//!
//! assert!(entry.apply(&policy, 1_000).allowed);
//! assert!(entry.apply(&policy, 1_001).allowed);
//!
//! let decision = entry.apply(&policy, 1_002);
//! assert!(!decision.allowed);
//! assert_eq!(decision.violations, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest block a key can ever receive.
pub const MAX_BLOCK: Duration = Duration::from_secs(24 * 60 * 60);

/// Limits and escalation settings shared by every key of a limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed per window
    pub max_requests: u64,
    /// Window duration
    pub window: Duration,
    /// Cumulative violations before a key gets blocked
    pub violation_threshold: u32,
    /// Block length per recorded violation
    pub base_block: Duration,
    /// Upper bound for a single block
    pub max_block: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            violation_threshold: 3,
            base_block: Duration::from_secs(5 * 60),
            max_block: MAX_BLOCK,
        }
    }
}

impl RateLimitPolicy {
    /// Create a policy with the default escalation settings
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            ..Default::default()
        }
    }

    /// Set the violation threshold
    pub fn with_violation_threshold(mut self, threshold: u32) -> Self {
        self.violation_threshold = threshold;
        self
    }

    /// Set the base block duration
    pub fn with_base_block(mut self, base_block: Duration) -> Self {
        self.base_block = base_block;
        self
    }

    /// Set the block cap
    pub fn with_max_block(mut self, max_block: Duration) -> Self {
        self.max_block = max_block;
        self
    }

    /// Block length for the given cumulative violation count
    pub fn block_duration(&self, violations: u32) -> Duration {
        self.base_block
            .saturating_mul(violations)
            .min(self.max_block)
    }

    /// Window length in milliseconds
    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    /// Get a human-readable description of the policy
    pub fn description(&self) -> String {
        format!(
            "Fixed window: {} requests per {:?}, block after {} violations ({:?} each, max {:?})",
            self.max_requests,
            self.window,
            self.violation_threshold,
            self.base_block,
            self.max_block
        )
    }
}

/// Per-key limiter state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Requests counted in the current window
    pub count: u64,
    /// When the current window ends (Unix millis)
    pub window_reset_ms: u64,
    /// Cumulative violations, never reset by a window rollover
    pub violations: u32,
    /// Block end (Unix millis), if a block was ever applied
    pub block_until_ms: Option<u64>,
}

/// Outcome of applying one request to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u64,
    /// When the current window ends (Unix millis)
    pub reset_at_ms: u64,
    /// Cumulative violations after this request
    pub violations: u32,
    /// Active block end, if any
    pub block_until_ms: Option<u64>,
    /// This request was counted as a new violation
    pub violation_recorded: bool,
    /// This request started a new block
    pub block_started: bool,
}

impl RateLimitEntry {
    /// Whether a block is active at `now_ms`
    pub fn is_blocked(&self, now_ms: u64) -> bool {
        self.block_until_ms.is_some_and(|until| until > now_ms)
    }

    /// Whether neither the window nor a block is live at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.window_reset_ms <= now_ms && !self.is_blocked(now_ms)
    }

    /// Clear violations and any block, keeping window accounting
    pub fn clear_violations(&mut self) {
        self.violations = 0;
        self.block_until_ms = None;
    }

    /// Account one request at `now_ms` and decide whether it passes
    pub fn apply(&mut self, policy: &RateLimitPolicy, now_ms: u64) -> EntryDecision {
        if self.is_blocked(now_ms) {
            return self.decision(policy, false, now_ms, false, false);
        }

        // Expired blocks are forgotten, the violation history is not
        if self.block_until_ms.is_some() {
            self.block_until_ms = None;
        }

        if now_ms >= self.window_reset_ms {
            self.count = 1;
            self.window_reset_ms = now_ms.saturating_add(policy.window_ms());
            return self.decision(policy, true, now_ms, false, false);
        }

        if self.count < policy.max_requests {
            self.count += 1;
            return self.decision(policy, true, now_ms, false, false);
        }

        self.violations = self.violations.saturating_add(1);
        let mut block_started = false;
        if self.violations >= policy.violation_threshold {
            let block = policy.block_duration(self.violations).as_millis() as u64;
            self.block_until_ms = Some(now_ms.saturating_add(block));
            block_started = true;
        }

        self.decision(policy, false, now_ms, true, block_started)
    }

    fn decision(
        &self,
        policy: &RateLimitPolicy,
        allowed: bool,
        now_ms: u64,
        violation_recorded: bool,
        block_started: bool,
    ) -> EntryDecision {
        let remaining = if allowed {
            policy.max_requests.saturating_sub(self.count)
        } else {
            0
        };

        EntryDecision {
            allowed,
            remaining,
            reset_at_ms: self.window_reset_ms,
            violations: self.violations,
            block_until_ms: self.block_until_ms.filter(|until| *until > now_ms),
            violation_recorded,
            block_started,
        }
    }
}
