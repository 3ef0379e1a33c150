//! Error taxonomy at the engine boundary
//!
//! Component errors are translated here. Transport errors from provider
//! calls never reach callers as-is; they arrive as
//! [`PaylaneError::ProviderUnavailable`].

use paylane_config::ConfigError;
use paylane_orders::{OrderError, OrderRef};
use paylane_providers::{Capability, ProviderError};
use paylane_ratelimit::RateLimitError;
use paylane_webhooks::WebhookError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, PaylaneError>;

/// Errors surfaced by the settlement engine
#[derive(Error, Debug)]
pub enum PaylaneError {
    /// Malformed or incomplete request
    #[error("Validation error on {field}: {message}")]
    Validation {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// Missing or invalid signature or credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller exceeded its quota
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Time to wait before retrying
        retry_after: Duration,
        /// Active block end (Unix millis), if blocked
        block_until_ms: Option<u64>,
        /// Cumulative violations
        violations: u32,
    },

    /// No enabled provider supports the capability
    #[error("No provider available for {0}")]
    NoProviderAvailable(Capability),

    /// The chosen provider failed or timed out
    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        /// Provider that failed
        provider: String,
        /// What went wrong
        reason: String,
        /// Order left in `created`, if one was recorded
        order_ref: Option<OrderRef>,
        /// Alternative provider for the same capability
        failover: Option<String>,
    },

    /// A webhook was already seen. Acknowledged, never a failure.
    #[error("Duplicate event {event_id} from {provider}")]
    DuplicateEvent {
        /// Provider
        provider: String,
        /// Provider-side event id
        event_id: String,
    },

    /// A webhook handler failed; the event stays unprocessed
    #[error("Handler failure: {0}")]
    HandlerFailure(String),

    /// Event data contradicts stored data
    #[error("Integrity conflict: {0}")]
    IntegrityConflict(String),

    /// No order with this reference
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage backend failure
    #[error("Store error: {0}")]
    Store(String),
}

impl PaylaneError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status for the error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::RateLimited { .. } => 429,
            Self::NoProviderAvailable(_) | Self::ProviderUnavailable { .. } => 503,
            Self::DuplicateEvent { .. } => 200,
            Self::OrderNotFound(_) => 404,
            Self::IntegrityConflict(_) => 409,
            Self::HandlerFailure(_) | Self::Config(_) | Self::Store(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::RateLimited { .. } => "rate_limited",
            Self::NoProviderAvailable(_) => "no_provider_available",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::DuplicateEvent { .. } => "duplicate_event",
            Self::HandlerFailure(_) => "handler_failure",
            Self::IntegrityConflict(_) => "integrity_conflict",
            Self::OrderNotFound(_) => "order_not_found",
            Self::Config(_) => "config_error",
            Self::Store(_) => "store_error",
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::NoProviderAvailable(_)
                | Self::ProviderUnavailable { .. }
                | Self::Store(_)
        )
    }

    /// Transport-neutral error body
    pub fn to_body(&self) -> ErrorBody {
        let (retry_after_secs, failover) = match self {
            Self::RateLimited { retry_after, .. } => (Some(retry_after.as_secs().max(1)), None),
            Self::ProviderUnavailable { failover, .. } => (None, failover.clone()),
            _ => (None, None),
        };

        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            retry_after_secs,
            failover,
        }
    }
}

/// Serializable error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Seconds to wait before retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Alternative provider to offer the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover: Option<String>,
}

impl From<RateLimitError> for PaylaneError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::LimitExceeded {
                retry_after,
                violations,
                block_until_ms,
                ..
            } => Self::RateLimited {
                retry_after,
                block_until_ms,
                violations,
            },
            RateLimitError::KeyExtractionError(msg) => Self::validation("client", msg),
            RateLimitError::ConfigError(msg) => Self::Config(ConfigError::ValidationError(msg)),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<ProviderError> for PaylaneError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoProviderAvailable(capability) => Self::NoProviderAvailable(capability),
            ProviderError::InvalidRequest(msg) => Self::validation("request", msg),
            ProviderError::Config(msg) => Self::Config(ConfigError::ValidationError(msg)),
            ProviderError::UnknownProvider(provider) => Self::ProviderUnavailable {
                reason: format!("{} is not registered", provider),
                provider,
                order_ref: None,
                failover: None,
            },
            ref unavailable @ (ProviderError::Unavailable { .. } | ProviderError::Timeout { .. }) => {
                Self::ProviderUnavailable {
                    provider: unavailable.provider().unwrap_or_default().to_string(),
                    reason: unavailable.to_string(),
                    order_ref: None,
                    failover: None,
                }
            }
        }
    }
}

impl From<OrderError> for PaylaneError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(reference) => Self::OrderNotFound(reference),
            OrderError::InvalidReference(msg) => Self::validation("order_ref", msg),
            OrderError::Invalid(msg) => Self::validation("order", msg),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<WebhookError> for PaylaneError {
    fn from(err: WebhookError) -> Self {
        if err.is_unauthorized() {
            return Self::Unauthorized(err.to_string());
        }
        match err {
            WebhookError::PayloadError(msg) => Self::validation("payload", msg),
            WebhookError::HandlerFailed(msg) => Self::HandlerFailure(msg),
            WebhookError::ConfigError(msg) => Self::Config(ConfigError::ValidationError(msg)),
            other => Self::Store(other.to_string()),
        }
    }
}
