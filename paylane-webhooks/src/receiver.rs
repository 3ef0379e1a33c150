//! Webhook receiver for authenticating and parsing incoming deliveries

use crate::signature::headers;
use crate::{Result, WebhookEnvelope, WebhookError, WebhookSignature};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

/// Request headers of a webhook delivery, looked up case-insensitively
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    entries: Vec<(String, String)>,
}

impl WebhookHeaders {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Signed headers for a payload, as a provider would send them
    pub fn signed(signer: &WebhookSignature, timestamp: i64, payload: &[u8]) -> Self {
        Self::new()
            .with(headers::SIGNATURE, signer.header_value(timestamp, payload))
            .with(headers::TIMESTAMP, timestamp.to_string())
    }

    /// Get a header value by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Signature and timestamp of the delivery.
    ///
    /// Besides the separate headers, a combined `t=<ts>,v1=<hex>` signature
    /// header is accepted.
    pub fn signature_parts(&self) -> Result<(String, String)> {
        let signature = self
            .get(headers::SIGNATURE)
            .ok_or(WebhookError::SignatureMissing)?;

        if let Some((timestamp, digest)) = parse_combined(signature) {
            return Ok((digest, timestamp));
        }

        let timestamp = self.get(headers::TIMESTAMP).ok_or_else(|| {
            WebhookError::TimestampInvalid("Timestamp header missing".to_string())
        })?;

        Ok((signature.to_string(), timestamp.to_string()))
    }
}

impl From<HashMap<String, String>> for WebhookHeaders {
    fn from(map: HashMap<String, String>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WebhookHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn parse_combined(signature: &str) -> Option<(String, String)> {
    let mut timestamp = None;
    let mut digest = None;

    for part in signature.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = Some(t.to_string()),
            Some(("v1", v)) => digest = Some(v.to_string()),
            _ => {}
        }
    }

    timestamp.zip(digest)
}

/// Receiver for one provider's webhooks
#[derive(Debug, Clone)]
pub struct WebhookReceiver {
    signature: WebhookSignature,
    timestamp_tolerance: Duration,
}

impl WebhookReceiver {
    /// Create a new receiver with the given secret
    pub fn new(secret: SecretString) -> Self {
        Self {
            signature: WebhookSignature::new(secret),
            timestamp_tolerance: Duration::from_secs(300),
        }
    }

    /// Set the timestamp tolerance
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.timestamp_tolerance = tolerance;
        self
    }

    /// The signer for this provider's secret
    pub fn signature(&self) -> &WebhookSignature {
        &self.signature
    }

    /// Authenticate a delivery without looking at the body's structure
    pub fn authenticate(
        &self,
        payload: &[u8],
        headers: &WebhookHeaders,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let (signature, timestamp) = headers.signature_parts()?;
        self.signature
            .verify(payload, &signature, &timestamp, now, self.timestamp_tolerance)?;
        Ok(signature)
    }

    /// Verify and parse an incoming webhook
    pub fn receive(
        &self,
        payload: &[u8],
        headers: &WebhookHeaders,
        now: DateTime<Utc>,
    ) -> Result<WebhookEnvelope> {
        self.authenticate(payload, headers, now)?;
        WebhookEnvelope::parse(payload)
    }
}
