//! Event type routing
//!
//! Handlers are registered per canonical event type. Types without a
//! handler, including every [`WebhookEventType::Unknown`], fall through to
//! the "acknowledge but ignore" path of the pipeline.

use crate::{Result, WebhookEnvelope, WebhookEventType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// An authenticated, parsed event handed to a handler
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Provider the event came from
    pub provider: String,
    /// Canonical event type
    pub kind: WebhookEventType,
    /// Parsed envelope
    pub envelope: WebhookEnvelope,
    /// When the pipeline accepted the delivery; handlers evaluate state as of this time
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Create a new inbound event received now
    pub fn new(provider: impl Into<String>, envelope: WebhookEnvelope) -> Self {
        Self {
            provider: provider.into(),
            kind: envelope.kind(),
            envelope,
            received_at: Utc::now(),
        }
    }

    /// Set the time the delivery was received
    pub fn at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Provider-side event id
    pub fn event_id(&self) -> &str {
        &self.envelope.id
    }
}

/// What a handler did with an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum HandlerOutcome {
    /// State was changed
    Applied,
    /// The target state was already reached, nothing changed
    Unchanged,
    /// The event conflicts with stored data and was not applied
    Conflict(String),
    /// The event was not relevant
    Ignored,
}

/// Handles one kind of webhook event
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Apply the event. An error leaves the event unprocessed for retry.
    async fn handle(&self, event: &InboundEvent) -> Result<HandlerOutcome>;
}

/// Registered handlers keyed by event type
#[derive(Clone, Default)]
pub struct WebhookRouter {
    handlers: HashMap<WebhookEventType, Arc<dyn WebhookHandler>>,
}

impl WebhookRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event type, replacing any previous one
    pub fn on(mut self, kind: WebhookEventType, handler: Arc<dyn WebhookHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Handler for an event type
    pub fn route(&self, kind: &WebhookEventType) -> Option<Arc<dyn WebhookHandler>> {
        self.handlers.get(kind).cloned()
    }

    /// Whether a handler is registered for the type
    pub fn handles(&self, kind: &WebhookEventType) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for WebhookRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookRouter")
            .field("event_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
