//! Startup configuration
//!
//! Settings are read once from `PAYLANE_*` variables and validated before
//! anything is built. A configured provider without an API key or webhook
//! secret is a startup error, never a per-request one.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PAYLANE_PROVIDERS` | required, comma list in tie-break order |
//! | `PAYLANE_PROVIDER_<NAME>_CAPABILITIES` | required |
//! | `PAYLANE_PROVIDER_<NAME>_BASE_URL` | required |
//! | `PAYLANE_PROVIDER_<NAME>_API_KEY` | required |
//! | `PAYLANE_PROVIDER_<NAME>_WEBHOOK_SECRET` | required |
//! | `PAYLANE_PROVIDER_<NAME>_ENABLED` | `true` |
//! | `PAYLANE_PROVIDER_<NAME>_TIMEOUT_MS` | `10000` |
//! | `PAYLANE_PROVIDER_<NAME>_UPTIME` / `_RESPONSE_MS` / `_SUCCESS_RATE` | `100` / `0` / `100` |
//! | `PAYLANE_RATE_LIMIT_WINDOW_MS` | `60000` |
//! | `PAYLANE_RATE_LIMIT_MAX_REQUESTS` | `100` |
//! | `PAYLANE_RATE_LIMIT_VIOLATION_THRESHOLD` | `3` |
//! | `PAYLANE_RATE_LIMIT_BASE_BLOCK_MS` | `300000` |
//! | `PAYLANE_RATE_LIMIT_REDIS_URL` | unset (in-memory) |
//! | `PAYLANE_WEBHOOK_TOLERANCE_SECS` | `300` |
//! | `PAYLANE_WEBHOOK_MAX_PAYLOAD_BYTES` | `1048576` |
//! | `PAYLANE_SESSION_TTL_SECS` | `1800` |
//! | `PAYLANE_LOG_LEVEL` / `PAYLANE_LOG_FORMAT` | `info` / `compact` |

use crate::telemetry::{LogFormat, LogSettings};
use paylane_config::{ConfigError, ConfigValidator, ConfigVars, EnvLoader, Result, Validate};
use paylane_providers::{
    Capability, HealthMetrics, HttpGateway, ProviderDescriptor, ProviderGateway,
    ProviderRegistry, ProviderResult,
};
use paylane_ratelimit::RateLimitPolicy;
use paylane_webhooks::WebhookConfig;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

/// One configured provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Lowercase provider name
    pub name: String,
    /// Supported capabilities
    pub capabilities: Vec<Capability>,
    /// API base URL
    pub base_url: String,
    /// API credential
    pub api_key: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
    /// Whether the provider may be selected
    pub enabled: bool,
    /// Call timeout
    pub timeout: Duration,
    /// Initial health
    pub metrics: HealthMetrics,
}

impl ProviderSettings {
    fn from_vars(vars: &ConfigVars, name: &str) -> Result<Self> {
        let key = |suffix: &str| {
            format!(
                "PROVIDER_{}_{}",
                name.to_ascii_uppercase().replace('-', "_"),
                suffix
            )
        };

        let capabilities_key = key("CAPABILITIES");
        let capabilities = vars
            .list(&capabilities_key)
            .iter()
            .map(|raw| {
                raw.parse::<Capability>()
                    .map_err(|e| ConfigError::invalid(vars.full_key(&capabilities_key), e))
            })
            .collect::<Result<Vec<_>>>()?;
        if capabilities.is_empty() {
            return Err(ConfigError::Missing(vars.full_key(&capabilities_key)));
        }

        let defaults = HealthMetrics::default();
        Ok(Self {
            name: name.to_ascii_lowercase(),
            capabilities,
            base_url: vars.require(&key("BASE_URL"))?.to_string(),
            api_key: vars.require_secret(&key("API_KEY"))?,
            webhook_secret: vars.require_secret(&key("WEBHOOK_SECRET"))?,
            enabled: vars.bool_or(&key("ENABLED"), true)?,
            timeout: Duration::from_millis(vars.parse_or(&key("TIMEOUT_MS"), 10_000u64)?),
            metrics: HealthMetrics::new(
                vars.parse_or(&key("UPTIME"), defaults.uptime_pct)?,
                vars.parse_or(&key("RESPONSE_MS"), defaults.response_time_ms)?,
                vars.parse_or(&key("SUCCESS_RATE"), defaults.success_rate_pct)?,
            ),
        })
    }

    /// Registry entry for this provider
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(&self.name, self.capabilities.iter().copied())
            .with_metrics(self.metrics)
            .enabled(self.enabled)
    }

    /// HTTP gateway for this provider
    pub fn gateway(&self) -> ProviderResult<HttpGateway> {
        HttpGateway::with_timeout(&self.name, &self.base_url, self.api_key.clone(), self.timeout)
    }
}

/// Rate limiter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Window length
    pub window: Duration,
    /// Requests allowed per window
    pub max_requests: u64,
    /// Violations before blocking starts
    pub violation_threshold: u32,
    /// Block length per violation
    pub base_block: Duration,
    /// Shared Redis store, when limiter state must span instances
    pub redis_url: Option<String>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let policy = RateLimitPolicy::default();
        Self {
            window: policy.window,
            max_requests: policy.max_requests,
            violation_threshold: policy.violation_threshold,
            base_block: policy.base_block,
            redis_url: None,
        }
    }
}

impl RateLimitSettings {
    /// Limiter policy
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.max_requests, self.window)
            .with_violation_threshold(self.violation_threshold)
            .with_base_block(self.base_block)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Providers in tie-break order
    pub providers: Vec<ProviderSettings>,
    /// Rate limiting
    pub rate_limit: RateLimitSettings,
    /// Webhook ingestion
    pub webhooks: WebhookConfig,
    /// How long a session stays open before it expires
    pub session_ttl: Duration,
    /// Logging
    pub log: LogSettings,
}

impl Settings {
    /// Load `.env` and the process environment, then validate
    pub fn from_env() -> Result<Self> {
        let vars = EnvLoader::default().load_dotenv()?;
        Self::from_vars(&vars)
    }

    /// Build from already loaded variables, then validate
    pub fn from_vars(vars: &ConfigVars) -> Result<Self> {
        let names = vars.list("PROVIDERS");
        if names.is_empty() {
            return Err(ConfigError::Missing(vars.full_key("PROVIDERS")));
        }
        let providers = names
            .iter()
            .map(|name| ProviderSettings::from_vars(vars, name))
            .collect::<Result<Vec<_>>>()?;

        let defaults = RateLimitSettings::default();
        let rate_limit = RateLimitSettings {
            window: Duration::from_millis(
                vars.parse_or("RATE_LIMIT_WINDOW_MS", defaults.window.as_millis() as u64)?,
            ),
            max_requests: vars.parse_or("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?,
            violation_threshold: vars
                .parse_or("RATE_LIMIT_VIOLATION_THRESHOLD", defaults.violation_threshold)?,
            base_block: Duration::from_millis(
                vars.parse_or("RATE_LIMIT_BASE_BLOCK_MS", defaults.base_block.as_millis() as u64)?,
            ),
            redis_url: vars.get("RATE_LIMIT_REDIS_URL").map(str::to_string),
        };

        let webhook_defaults = WebhookConfig::default();
        let webhooks = WebhookConfig::builder()
            .timestamp_tolerance_secs(vars.parse_or(
                "WEBHOOK_TOLERANCE_SECS",
                webhook_defaults.timestamp_tolerance.as_secs(),
            )?)
            .max_payload_size(
                vars.parse_or("WEBHOOK_MAX_PAYLOAD_BYTES", webhook_defaults.max_payload_size)?,
            )
            .build();

        let log = LogSettings {
            level: vars.get("LOG_LEVEL").unwrap_or("info").to_string(),
            format: vars.parse_or("LOG_FORMAT", LogFormat::default())?,
        };

        let settings = Self {
            providers,
            rate_limit,
            webhooks,
            session_ttl: Duration::from_secs(vars.parse_or("SESSION_TTL_SECS", 1800u64)?),
            log,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Provider registry seeded from configuration
    pub fn registry(&self) -> ProviderResult<ProviderRegistry> {
        ProviderRegistry::from_descriptors(self.providers.iter().map(ProviderSettings::descriptor))
    }

    /// One HTTP gateway per provider
    pub fn gateways(&self) -> ProviderResult<Vec<Arc<dyn ProviderGateway>>> {
        self.providers
            .iter()
            .map(|p| p.gateway().map(|g| Arc::new(g) as Arc<dyn ProviderGateway>))
            .collect()
    }

    /// Settings for a provider
    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        let name = name.to_ascii_lowercase();
        self.providers.iter().find(|p| p.name == name)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        for provider in &self.providers {
            let field = |suffix: &str| format!("provider {} {}", provider.name, suffix);
            ConfigValidator::not_empty(&provider.name, "provider name")?;
            ConfigValidator::is_url(&provider.base_url, &field("base_url"))?;
            ConfigValidator::positive(provider.timeout.as_millis() as u64, &field("timeout_ms"))?;
            ConfigValidator::in_range(provider.metrics.uptime_pct, 0.0, 100.0, &field("uptime"))?;
            ConfigValidator::in_range(
                provider.metrics.success_rate_pct,
                0.0,
                100.0,
                &field("success_rate"),
            )?;
            let response_ms = provider.metrics.response_time_ms;
            if !response_ms.is_finite() || response_ms < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a finite, non-negative number",
                    field("response_ms")
                )));
            }
        }

        let mut names: Vec<&str> = self.providers.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::ValidationError(format!(
                "provider {} listed twice",
                pair[0]
            )));
        }

        ConfigValidator::positive(self.rate_limit.max_requests, "rate limit max_requests")?;
        ConfigValidator::positive(
            self.rate_limit.window.as_millis() as u64,
            "rate limit window_ms",
        )?;
        ConfigValidator::positive(
            u64::from(self.rate_limit.violation_threshold),
            "rate limit violation_threshold",
        )?;
        ConfigValidator::positive(
            self.rate_limit.base_block.as_millis() as u64,
            "rate limit base_block_ms",
        )?;
        if let Some(url) = &self.rate_limit.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::invalid(
                    "PAYLANE_RATE_LIMIT_REDIS_URL",
                    "must start with redis:// or rediss://",
                ));
            }
            #[cfg(not(feature = "redis"))]
            return Err(ConfigError::invalid(
                "PAYLANE_RATE_LIMIT_REDIS_URL",
                "requires the redis feature",
            ));
        }

        ConfigValidator::positive(
            self.webhooks.timestamp_tolerance.as_secs(),
            "webhook tolerance_secs",
        )?;
        ConfigValidator::positive(self.webhooks.max_payload_size as u64, "webhook max_payload_bytes")?;
        ConfigValidator::positive(self.session_ttl.as_secs(), "session ttl_secs")?;
        Ok(())
    }
}
