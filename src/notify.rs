//! Structured notifications for operational tooling
//!
//! The engine emits a [`Notification`] for rate-limit violations, webhook
//! outcomes worth attention and integrity conflicts. Sinks are
//! fire-and-forget: [`NotificationSink::emit`] returns nothing, so a broken
//! sink can never fail the request that produced the event.

use chrono::{DateTime, Utc};
use paylane_ratelimit::{ViolationEvent, ViolationObserver};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// How urgent a notification is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine
    Info,
    /// Worth a look
    Warning,
    /// Needs action
    Critical,
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A client went over its request cap
    RateLimitViolation,
    /// A client was blocked
    ClientBlocked,
    /// A webhook failed authentication
    WebhookRejected,
    /// A webhook handler failed
    WebhookFailed,
    /// Event data contradicted stored data
    IntegrityConflict,
    /// A provider call failed
    ProviderFailure,
}

impl NotificationKind {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimitViolation => "rate_limit_violation",
            Self::ClientBlocked => "client_blocked",
            Self::WebhookRejected => "webhook_rejected",
            Self::WebhookFailed => "webhook_failed",
            Self::IntegrityConflict => "integrity_conflict",
            Self::ProviderFailure => "provider_failure",
        }
    }
}

/// A structured event for the notification sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Event type
    pub kind: NotificationKind,
    /// Urgency
    pub severity: Severity,
    /// Short description
    pub message: String,
    /// Event specific fields
    pub metadata: serde_json::Value,
    /// When it happened
    pub at: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped now
    pub fn new(kind: NotificationKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            metadata: serde_json::Value::Null,
            at: Utc::now(),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Receives notifications
pub trait NotificationSink: Send + Sync {
    /// Must not block and must not panic
    fn emit(&self, notification: Notification);
}

/// Sink that writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn emit(&self, notification: Notification) {
        let kind = notification.kind.as_str();
        match notification.severity {
            Severity::Info => tracing::info!(
                kind,
                metadata = %notification.metadata,
                "{}",
                notification.message
            ),
            Severity::Warning => tracing::warn!(
                kind,
                metadata = %notification.metadata,
                "{}",
                notification.message
            ),
            Severity::Critical => tracing::error!(
                kind,
                metadata = %notification.metadata,
                "{}",
                notification.message
            ),
        }
    }
}

/// Sink that keeps notifications in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    notifications: Mutex<Vec<Notification>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Emitted notifications of one kind
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl NotificationSink for MemorySink {
    fn emit(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

/// Forwards limiter violations to a sink
pub struct ViolationNotifier {
    sink: Arc<dyn NotificationSink>,
}

impl ViolationNotifier {
    /// Wrap a sink
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }
}

impl ViolationObserver for ViolationNotifier {
    fn on_violation(&self, event: &ViolationEvent) {
        let (kind, severity, message) = if event.block_started {
            (
                NotificationKind::ClientBlocked,
                Severity::Warning,
                "Client blocked after repeated rate limit violations",
            )
        } else {
            (
                NotificationKind::RateLimitViolation,
                Severity::Info,
                "Rate limit exceeded",
            )
        };

        let metadata = serde_json::to_value(event).unwrap_or_default();
        self.sink
            .emit(Notification::new(kind, severity, message).with_metadata(metadata));
    }
}
