//! Violation notifications
//!
//! A limiter can carry a [`ViolationObserver`] that hears about every request
//! counted as a violation. Observers must not block and must not fail the
//! request: they are fire-and-forget hooks for security tooling.

use serde::Serialize;

/// A request that went over the cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationEvent {
    /// Client identifier the limiter keyed on
    pub identifier: String,
    /// Endpoint the request targeted, if known
    pub endpoint: Option<String>,
    /// Cumulative violations for the identifier
    pub violation_count: u32,
    /// Block end (Unix millis) if the identifier is now blocked
    pub block_until_ms: Option<u64>,
    /// Whether this violation started a new block
    pub block_started: bool,
    /// When the violation happened (Unix millis)
    pub at_ms: u64,
}

/// Receives violation events from a limiter
pub trait ViolationObserver: Send + Sync {
    /// Called once per recorded violation
    fn on_violation(&self, event: &ViolationEvent);
}

impl<F> ViolationObserver for F
where
    F: Fn(&ViolationEvent) + Send + Sync,
{
    fn on_violation(&self, event: &ViolationEvent) {
        self(event)
    }
}

/// Observer that only logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ViolationObserver for LoggingObserver {
    fn on_violation(&self, event: &ViolationEvent) {
        if event.block_started {
            tracing::warn!(
                identifier = %event.identifier,
                endpoint = ?event.endpoint,
                violations = event.violation_count,
                block_until_ms = ?event.block_until_ms,
                "Client blocked after repeated rate limit violations"
            );
        } else {
            tracing::info!(
                identifier = %event.identifier,
                endpoint = ?event.endpoint,
                violations = event.violation_count,
                "Rate limit violation"
            );
        }
    }
}
