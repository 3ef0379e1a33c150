//! Error types for provider selection and provider calls

use crate::Capability;
use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider name not present in the registry
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// No enabled provider supports the capability
    #[error("No provider available for {0}")]
    NoProviderAvailable(Capability),

    /// The provider call failed
    #[error("Provider {provider} unavailable: {reason}")]
    Unavailable {
        /// Provider name
        provider: String,
        /// What went wrong
        reason: String,
    },

    /// The provider did not answer in time
    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout {
        /// Provider name
        provider: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Request rejected before it was sent
    #[error("Invalid provider request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Create an unavailable error
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the caller may try another provider for the same request
    pub fn is_failover_candidate(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Provider the error concerns, if any
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::UnknownProvider(name) => Some(name),
            Self::Unavailable { provider, .. } | Self::Timeout { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failover_candidates() {
        assert!(ProviderError::unavailable("nium", "502").is_failover_candidate());
        assert!(
            ProviderError::Timeout {
                provider: "nium".into(),
                timeout: Duration::from_secs(5),
            }
            .is_failover_candidate()
        );
        assert!(!ProviderError::NoProviderAvailable(Capability::Payout).is_failover_candidate());
    }

    #[test]
    fn test_display() {
        let err = ProviderError::NoProviderAvailable(Capability::IbanIssuance);
        assert_eq!(err.to_string(), "No provider available for iban_issuance");
        assert_eq!(
            ProviderError::unavailable("openpayd", "HTTP 503").provider(),
            Some("openpayd")
        );
    }
}
