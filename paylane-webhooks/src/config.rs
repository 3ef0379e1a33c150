//! Configuration for webhook ingestion

use std::time::Duration;

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Allowed clock skew between the signature timestamp and now
    pub timestamp_tolerance: Duration,

    /// How long an in-flight record may sit before replay takes it over
    pub stuck_after: Duration,

    /// Maximum payload size in bytes
    pub max_payload_size: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance: Duration::from_secs(300),
            stuck_after: Duration::from_secs(600),
            max_payload_size: 1024 * 1024, // 1MB
        }
    }
}

impl WebhookConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> WebhookConfigBuilder {
        WebhookConfigBuilder::new()
    }

    pub(crate) fn stuck_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stuck_after).unwrap_or(chrono::Duration::MAX)
    }
}

/// Builder for WebhookConfig
#[derive(Debug, Clone, Default)]
pub struct WebhookConfigBuilder {
    config: WebhookConfig,
}

impl WebhookConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: WebhookConfig::default(),
        }
    }

    /// Set timestamp tolerance for signature verification
    pub fn timestamp_tolerance(mut self, tolerance: Duration) -> Self {
        self.config.timestamp_tolerance = tolerance;
        self
    }

    /// Set timestamp tolerance in seconds
    pub fn timestamp_tolerance_secs(mut self, seconds: u64) -> Self {
        self.config.timestamp_tolerance = Duration::from_secs(seconds);
        self
    }

    /// Set the age after which an in-flight record counts as stuck
    pub fn stuck_after(mut self, stuck_after: Duration) -> Self {
        self.config.stuck_after = stuck_after;
        self
    }

    /// Set maximum payload size
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> WebhookConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WebhookConfig::default();
        assert_eq!(config.timestamp_tolerance, Duration::from_secs(300));
        assert_eq!(config.stuck_after, Duration::from_secs(600));
        assert_eq!(config.max_payload_size, 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let config = WebhookConfig::builder()
            .timestamp_tolerance_secs(60)
            .stuck_after(Duration::from_secs(30))
            .max_payload_size(2048)
            .build();

        assert_eq!(config.timestamp_tolerance, Duration::from_secs(60));
        assert_eq!(config.stuck_after_chrono(), chrono::Duration::seconds(30));
        assert_eq!(config.max_payload_size, 2048);
    }
}
