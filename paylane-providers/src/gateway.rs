//! Provider gateways
//!
//! A gateway opens a checkout session with one provider. Every call is
//! bounded by a timeout, and transport failures come back as
//! [`ProviderError::Unavailable`] or [`ProviderError::Timeout`], never as raw
//! HTTP client errors.

use crate::{Capability, ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default provider call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request to open a session with a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Our order reference, echoed back in provider callbacks
    pub order_ref: String,
    /// Requested operation
    pub capability: Capability,
    /// Amount in major units
    pub amount: Decimal,
    /// Currency or asset code
    pub currency: String,
    /// Operation specific fields (beneficiary, asset, network...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SessionRequest {
    /// Create a session request
    pub fn new(
        order_ref: impl Into<String>,
        capability: Capability,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            order_ref: order_ref.into(),
            capability,
            amount,
            currency: currency.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Add an operation specific field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Check the request before it goes out
    pub fn validate(&self) -> ProviderResult<()> {
        if self.order_ref.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("order_ref is required".into()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(ProviderError::InvalidRequest(
                "amount must be positive".into(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("currency is required".into()));
        }
        Ok(())
    }
}

/// A session opened by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    /// Provider-side identifier
    pub external_id: String,
    /// Handle the client uses to continue with the provider (URL or token)
    pub checkout_handle: String,
    /// Provider-side expiry, if the provider reports one
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Opens sessions with one provider
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Provider this gateway talks to
    fn provider(&self) -> &str;

    /// Upper bound on a single call
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Open a session
    async fn create_session(&self, request: &SessionRequest) -> ProviderResult<ProviderSession>;
}

/// Gateway speaking a generic JSON contract over HTTP
///
/// `POST {base_url}/sessions` with bearer authentication; the response body
/// is a [`ProviderSession`].
pub struct HttpGateway {
    provider: String,
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    timeout: Duration,
}

impl HttpGateway {
    /// Create a gateway with the default timeout
    pub fn new(
        provider: impl Into<String>,
        base_url: &str,
        api_key: SecretString,
    ) -> ProviderResult<Self> {
        Self::with_timeout(provider, base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a gateway with a custom timeout
    pub fn with_timeout(
        provider: impl Into<String>,
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let provider = provider.into().to_ascii_lowercase();
        if timeout.is_zero() {
            return Err(ProviderError::config(format!(
                "{}: timeout must be greater than zero",
                provider
            )));
        }

        // Trailing slash so joins append instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            ProviderError::config(format!("{}: invalid base URL {}: {}", provider, base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("{}: {}", provider, e)))?;

        Ok(Self {
            provider,
            client,
            base_url,
            api_key,
            timeout,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::config(format!("{}: {}", self.provider, e)))
    }

    fn transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                provider: self.provider.clone(),
                timeout: self.timeout,
            }
        } else if error.is_decode() {
            ProviderError::unavailable(&self.provider, format!("invalid response body: {}", error))
        } else {
            ProviderError::unavailable(&self.provider, format!("request failed: {}", error))
        }
    }
}

#[async_trait]
impl ProviderGateway for HttpGateway {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn create_session(&self, request: &SessionRequest) -> ProviderResult<ProviderSession> {
        request.validate()?;
        let url = self.endpoint("sessions")?;

        debug!(
            provider = %self.provider,
            order_ref = %request.order_ref,
            capability = %request.capability,
            "Creating provider session"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                provider = %self.provider,
                order_ref = %request.order_ref,
                status = status.as_u16(),
                "Provider rejected session request"
            );
            return Err(ProviderError::unavailable(
                &self.provider,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let session: ProviderSession = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        if session.external_id.trim().is_empty() {
            return Err(ProviderError::unavailable(
                &self.provider,
                "response carried an empty external id",
            ));
        }

        Ok(session)
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
