//! Webhook event types and records

use crate::{Result, WebhookError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical event types understood by the router.
///
/// Provider vocabularies differ, so several spellings map to one variant.
/// Anything unrecognised becomes [`WebhookEventType::Unknown`] and is
/// acknowledged without a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    /// Provider confirmed the transaction settled
    TransactionCompleted,
    /// Provider declined or failed the transaction
    TransactionFailed,
    /// Provider let the session lapse
    TransactionExpired,
    /// Provider cancelled the transaction
    TransactionCancelled,
    /// Any other event type
    Unknown(String),
}

impl WebhookEventType {
    /// Map a provider event type onto the canonical set
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "transaction.completed" | "transaction.succeeded" | "payment.completed"
            | "payment.succeeded" | "session.completed" | "order.completed"
            | "payout.completed" => Self::TransactionCompleted,
            "transaction.failed" | "transaction.declined" | "payment.failed"
            | "payment.declined" | "session.failed" | "order.failed" | "payout.failed" => {
                Self::TransactionFailed
            }
            "transaction.expired" | "session.expired" | "order.expired" => {
                Self::TransactionExpired
            }
            "transaction.cancelled" | "transaction.canceled" | "session.cancelled"
            | "order.cancelled" => Self::TransactionCancelled,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &str {
        match self {
            Self::TransactionCompleted => "transaction.completed",
            Self::TransactionFailed => "transaction.failed",
            Self::TransactionExpired => "transaction.expired",
            Self::TransactionCancelled => "transaction.cancelled",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the type is outside the canonical set
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The minimal JSON envelope every provider callback carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Provider-side event id
    pub id: String,

    /// Provider event type
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event data
    #[serde(default)]
    pub data: serde_json::Value,
}

impl WebhookEnvelope {
    /// Parse and validate a raw body
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let envelope: WebhookEnvelope = serde_json::from_slice(payload)?;

        if envelope.id.trim().is_empty() {
            return Err(WebhookError::payload("event id is empty"));
        }
        if envelope.event_type.trim().is_empty() {
            return Err(WebhookError::payload("event type is empty"));
        }

        Ok(envelope)
    }

    /// Canonical event type
    pub fn kind(&self) -> WebhookEventType {
        WebhookEventType::parse(&self.event_type)
    }

    /// A string field of `data`
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }
}

/// Stored record of one provider event, unique per `(provider, event_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Provider the event came from
    pub provider: String,
    /// Provider-side event id
    pub event_id: String,
    /// Provider event type as received
    pub event_type: String,
    /// Signature the delivery carried
    pub signature: String,
    /// Raw body, kept for audit and replay
    pub payload: String,
    /// Whether a handler finished with the event
    pub processed: bool,
    /// When the event was marked processed
    pub processed_at: Option<DateTime<Utc>>,
    /// Last handler error, if the last attempt failed
    pub error: Option<String>,
    /// Handler attempts so far
    pub attempts: u32,
    /// When the first delivery arrived
    pub received_at: DateTime<Utc>,
    /// When the last handler attempt started
    pub last_attempt_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// New unprocessed record for a first delivery
    pub fn new(
        provider: impl Into<String>,
        envelope: &WebhookEnvelope,
        signature: impl Into<String>,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            provider: provider.into(),
            event_id: envelope.id.clone(),
            event_type: envelope.event_type.clone(),
            signature: signature.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            processed: false,
            processed_at: None,
            error: None,
            attempts: 1,
            received_at: now,
            last_attempt_at: now,
        }
    }

    /// Last handler attempt failed and nobody is retrying it
    pub fn is_failed(&self) -> bool {
        !self.processed && self.error.is_some()
    }

    /// A handler attempt is (or was, before a crash) running
    pub fn is_in_flight(&self) -> bool {
        !self.processed && self.error.is_none()
    }

    /// Whether a handler may be re-driven for this record at `now`.
    ///
    /// Failed records are always eligible. In-flight records only become
    /// eligible once their last attempt is older than `stuck_after`.
    pub fn is_retryable(&self, now: DateTime<Utc>, stuck_after: chrono::Duration) -> bool {
        self.is_failed() || (self.is_in_flight() && now - self.last_attempt_at >= stuck_after)
    }

    /// Parse the stored body again
    pub fn envelope(&self) -> Result<WebhookEnvelope> {
        WebhookEnvelope::parse(self.payload.as_bytes())
    }
}
