//! Error types for webhook operations

use thiserror::Error;

/// Errors that can occur during webhook ingestion
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Signature missing from request
    #[error("Signature missing from request")]
    SignatureMissing,

    /// Timestamp validation failed
    #[error("Timestamp validation failed: {0}")]
    TimestampInvalid(String),

    /// No webhook secret is registered for the provider
    #[error("Unknown webhook provider: {0}")]
    UnknownProvider(String),

    /// Payload serialization/deserialization failed
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// Event store failure
    #[error("Event store error: {0}")]
    StoreError(String),

    /// A handler raised while processing an event
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WebhookError {
    /// Create a payload error
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::PayloadError(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    /// Create a handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::HandlerFailed(msg.into())
    }

    /// Whether the error means the caller could not be authenticated
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid(_)
                | Self::SignatureMissing
                | Self::TimestampInvalid(_)
                | Self::UnknownProvider(_)
        )
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::PayloadError(err.to_string())
    }
}
