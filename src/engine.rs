//! The settlement engine
//!
//! [`SettlementEngine`] owns every component and is the only thing the
//! surrounding application talks to:
//!
//! - [`SettlementEngine::start_operation`] gates the caller through the rate
//!   limiter, picks the best provider, records the order and opens a session.
//! - [`SettlementEngine::receive_webhook`] runs a provider callback through
//!   the ingestion pipeline, whose handlers drive the order state machine.
//! - Outcomes observed on both paths feed back into provider health.
//!
//! Provider calls are bounded by the gateway timeout. A failed call leaves
//! the order in `created` and is never retried here; the error carries the
//! best alternative provider so the caller can offer it.

use crate::error::{PaylaneError, Result};
use crate::handlers::order_router;
use crate::notify::{
    Notification, NotificationKind, NotificationSink, Severity, TracingSink, ViolationNotifier,
};
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use paylane_config::ConfigError;
use paylane_orders::{
    Amount, MemoryOrderStore, Order, OrderRef, OrderStatus, OrderStore, Transition,
    TransitionOutcome,
};
use paylane_providers::{
    Capability, Decimal, HealthMetrics, Observation, Outcome, ProviderError, ProviderGateway,
    ProviderRegistry, ProviderStatus, SessionRequest,
};
use paylane_ratelimit::{RateLimitCheckResult, RateLimitPolicy, RateLimitStore, RateLimiter};
use paylane_webhooks::{
    HandlerOutcome, IngestOutcome, IngestReport, PipelineObserver, ReplaySummary, WebhookConfig,
    WebhookEventStore, WebhookEventType, WebhookHeaders, WebhookPipeline,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default session lifetime
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Boundary types
// ============================================================================

/// Who is calling, for rate limiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Rate limit key, usually the client address
    pub identifier: String,
    /// Endpoint being called, reported with violations
    pub endpoint: Option<String>,
}

impl ClientContext {
    /// Client identified by address or key
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            endpoint: None,
        }
    }

    /// Attach the endpoint being called
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Request to start a financial operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Requested capability
    pub capability: Capability,
    /// Amount in major units
    pub amount: Decimal,
    /// Currency or asset code
    pub currency: String,
    /// Capability specific fields, passed to the provider untouched
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl OperationRequest {
    /// Create a request without extra fields
    pub fn new(capability: Capability, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            capability,
            amount,
            currency: currency.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Add a capability specific field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Reject requests that cannot be sent to any provider
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(PaylaneError::validation("amount", "must be positive"));
        }
        let currency = self.currency.trim();
        if currency.is_empty() {
            return Err(PaylaneError::validation("currency", "is required"));
        }
        if !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PaylaneError::validation(
                "currency",
                format!("'{}' is not a currency or asset code", currency),
            ));
        }
        Ok(())
    }
}

/// Successful start of an operation
///
/// `status` is the stored order status once the provider accepted the
/// session, normally `pending`. It is never reported as `created`: a
/// response only exists after the order has left that state, and clients
/// polling [`SettlementEngine::order_status`] see the same value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStarted {
    /// Provider chosen for the operation
    pub provider: String,
    /// Our order reference
    pub order_ref: OrderRef,
    /// What the client needs to continue with the provider
    pub provider_checkout_handle: String,
    /// Stored order status after the provider accepted (`pending`, not `created`)
    pub status: OrderStatus,
    /// When the session lapses
    pub expires_at: DateTime<Utc>,
}

/// Counts from one housekeeping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HousekeepingReport {
    /// Idle limiter entries evicted
    pub evicted_rate_limits: usize,
    /// Pending orders moved to `expired`
    pub expired_orders: usize,
}

// ============================================================================
// Health feedback
// ============================================================================

/// Feeds webhook outcomes back into provider health and the notification sink
struct IngestFeedback {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn NotificationSink>,
}

impl IngestFeedback {
    fn observation(report: &IngestReport) -> Option<Outcome> {
        if report.outcome != IngestOutcome::Processed(HandlerOutcome::Applied) {
            return None;
        }
        match report.event_type.as_ref()? {
            WebhookEventType::TransactionCompleted => Some(Outcome::Success),
            WebhookEventType::TransactionFailed | WebhookEventType::TransactionExpired => {
                Some(Outcome::Failure)
            }
            _ => None,
        }
    }

    fn notify(&self, report: &IngestReport, kind: NotificationKind, severity: Severity, detail: &str) {
        self.sink.emit(
            Notification::new(kind, severity, format!("Webhook from {} not processed", report.provider))
                .with_metadata(serde_json::json!({
                    "provider": report.provider,
                    "event_id": report.event_id,
                    "event_type": report.event_type.as_ref().map(|t| t.as_str()),
                    "replayed": report.replayed,
                    "detail": detail,
                })),
        );
    }
}

impl PipelineObserver for IngestFeedback {
    fn on_ingest(&self, report: &IngestReport) {
        if let Some(outcome) = Self::observation(report) {
            if let Err(e) = self.registry.record_outcome(&report.provider, outcome) {
                debug!(provider = %report.provider, error = %e, "No health to update");
            }
        }

        match &report.outcome {
            IngestOutcome::Rejected(reason) => self.notify(
                report,
                NotificationKind::WebhookRejected,
                Severity::Warning,
                reason,
            ),
            IngestOutcome::HandlerFailed(reason) => self.notify(
                report,
                NotificationKind::WebhookFailed,
                Severity::Warning,
                reason,
            ),
            IngestOutcome::StoreFailed(reason) => self.notify(
                report,
                NotificationKind::WebhookFailed,
                Severity::Critical,
                reason,
            ),
            _ => {}
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Provider orchestration and settlement engine
pub struct SettlementEngine {
    limiter: Arc<RateLimiter>,
    registry: Arc<ProviderRegistry>,
    gateways: HashMap<String, Arc<dyn ProviderGateway>>,
    orders: Arc<dyn OrderStore>,
    pipeline: WebhookPipeline,
    sink: Arc<dyn NotificationSink>,
    session_ttl: chrono::Duration,
}

impl SettlementEngine {
    /// Create a new engine builder
    pub fn builder() -> SettlementEngineBuilder {
        SettlementEngineBuilder::new()
    }

    /// Engine with HTTP gateways and in-memory stores, from validated settings
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Self::builder()
            .registry(settings.registry()?)
            .rate_limit(settings.rate_limit.policy())
            .webhook_config(settings.webhooks.clone())
            .session_ttl(settings.session_ttl);

        if let Some(url) = &settings.rate_limit.redis_url {
            builder = builder.redis_url(url);
        }
        for gateway in settings.gateways()? {
            builder = builder.gateway(gateway);
        }
        for provider in &settings.providers {
            builder = builder.webhook_secret(&provider.name, provider.webhook_secret.clone());
        }

        builder.build().await
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Start an operation with the best provider for the capability
    pub async fn start_operation(
        &self,
        client: &ClientContext,
        request: OperationRequest,
    ) -> Result<OperationStarted> {
        self.start_operation_at(client, request, Utc::now()).await
    }

    /// [`start_operation`](Self::start_operation) at an explicit time
    pub async fn start_operation_at(
        &self,
        client: &ClientContext,
        request: OperationRequest,
        now: DateTime<Utc>,
    ) -> Result<OperationStarted> {
        self.admit(client, now).await?;
        request.validate()?;

        let provider = self.registry.best_provider(request.capability)?;
        self.open_session(provider, request, now).await
    }

    /// Start an operation with a provider the caller picked, typically the
    /// failover offered by a previous [`PaylaneError::ProviderUnavailable`]
    pub async fn start_operation_on(
        &self,
        client: &ClientContext,
        provider: &str,
        request: OperationRequest,
    ) -> Result<OperationStarted> {
        let now = Utc::now();
        self.admit(client, now).await?;
        request.validate()?;

        let provider = provider.trim().to_ascii_lowercase();
        let selectable = self
            .registry
            .ranked(request.capability)
            .iter()
            .any(|(name, _)| *name == provider);
        if !selectable {
            return Err(PaylaneError::validation(
                "provider",
                format!(
                    "{} is not an enabled provider for {}",
                    provider, request.capability
                ),
            ));
        }

        self.open_session(provider, request, now).await
    }

    async fn admit(&self, client: &ClientContext, now: DateTime<Utc>) -> Result<RateLimitCheckResult> {
        let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let result = self
            .limiter
            .check_at(&client.identifier, client.endpoint.as_deref(), now_ms)
            .await?;
        Ok(result.into_result()?)
    }

    async fn open_session(
        &self,
        provider: String,
        request: OperationRequest,
        now: DateTime<Utc>,
    ) -> Result<OperationStarted> {
        let gateway = self.gateways.get(&provider).cloned().ok_or_else(|| {
            PaylaneError::ProviderUnavailable {
                provider: provider.clone(),
                reason: "no gateway configured".to_string(),
                order_ref: None,
                failover: self.registry.failover_provider(request.capability, &provider),
            }
        })?;

        let capability = request.capability;
        let order = Order::new(
            capability,
            &provider,
            Amount::new(request.amount, request.currency.trim()),
            self.session_ttl,
            now,
        );
        let reference = order.reference.clone();
        let session_request = SessionRequest {
            order_ref: reference.to_string(),
            capability,
            amount: order.amount.value,
            currency: order.amount.currency.clone(),
            fields: request.fields,
        };
        self.orders.insert(order).await?;

        info!(
            order_ref = %reference,
            provider = %provider,
            capability = %capability,
            "Opening provider session"
        );

        let started = Instant::now();
        let timeout = gateway.timeout();
        let session = match tokio::time::timeout(timeout, gateway.create_session(&session_request))
            .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(ProviderError::InvalidRequest(message))) => {
                return Err(PaylaneError::validation("request", message));
            }
            Ok(Err(e)) => return Err(self.provider_failed(&provider, capability, reference, e.to_string())),
            Err(_) => {
                let reason = ProviderError::Timeout {
                    provider: provider.clone(),
                    timeout,
                }
                .to_string();
                return Err(self.provider_failed(&provider, capability, reference, reason));
            }
        };

        if let Err(e) = self
            .registry
            .record_outcome(&provider, Observation::success().with_latency(started.elapsed()))
        {
            debug!(provider = %provider, error = %e, "No health to update");
        }

        let accepted = Transition::accepted(session.external_id.clone())
            .metadata("checkout_handle", session.checkout_handle.clone());
        let order = match self.orders.transition(&reference, &accepted, now).await? {
            TransitionOutcome::Applied { order, .. } | TransitionOutcome::AlreadyInState(order) => {
                order
            }
            TransitionOutcome::Rejected {
                current, reason, ..
            } => {
                // Cancelled while the provider call was in flight
                warn!(
                    order_ref = %reference,
                    current = %current,
                    reason = %reason,
                    "Provider accepted an order that already moved on"
                );
                self.require_order(&reference).await?
            }
            TransitionOutcome::IntegrityConflict { bound, offered } => {
                let detail = format!(
                    "order {} is bound to {}, provider {} returned {}",
                    reference, bound, provider, offered
                );
                error!(order_ref = %reference, provider = %provider, detail = %detail, "Session binding conflict");
                self.sink.emit(
                    Notification::new(
                        NotificationKind::IntegrityConflict,
                        Severity::Critical,
                        "Provider returned an id bound to another order",
                    )
                    .with_metadata(serde_json::json!({
                        "order_ref": reference.as_str(),
                        "provider": provider,
                        "external_id": offered,
                    })),
                );
                return Err(PaylaneError::IntegrityConflict(detail));
            }
        };

        info!(
            order_ref = %order.reference,
            provider = %provider,
            external_id = ?order.external_id,
            status = %order.status,
            "Provider session opened"
        );

        Ok(OperationStarted {
            provider,
            order_ref: order.reference,
            provider_checkout_handle: session.checkout_handle,
            status: order.status,
            expires_at: order.expires_at,
        })
    }

    fn provider_failed(
        &self,
        provider: &str,
        capability: Capability,
        reference: OrderRef,
        reason: String,
    ) -> PaylaneError {
        if let Err(e) = self.registry.record_outcome(provider, Observation::failure()) {
            debug!(provider = %provider, error = %e, "No health to update");
        }
        let failover = self.registry.failover_provider(capability, provider);

        warn!(
            order_ref = %reference,
            provider = %provider,
            failover = ?failover,
            reason = %reason,
            "Provider session failed, order left in created"
        );
        self.sink.emit(
            Notification::new(
                NotificationKind::ProviderFailure,
                Severity::Warning,
                format!("Provider {} failed to open a session", provider),
            )
            .with_metadata(serde_json::json!({
                "provider": provider,
                "capability": capability,
                "order_ref": reference.as_str(),
                "failover": failover,
                "reason": reason,
            })),
        );

        PaylaneError::ProviderUnavailable {
            provider: provider.to_string(),
            reason,
            order_ref: Some(reference),
            failover,
        }
    }

    /// Run a provider callback through the ingestion pipeline
    pub async fn receive_webhook(
        &self,
        provider: &str,
        headers: &WebhookHeaders,
        payload: &[u8],
    ) -> IngestOutcome {
        self.pipeline.ingest(provider, headers, payload).await
    }

    /// [`receive_webhook`](Self::receive_webhook) at an explicit time
    pub async fn receive_webhook_at(
        &self,
        provider: &str,
        headers: &WebhookHeaders,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        self.pipeline.ingest_at(provider, headers, payload, now).await
    }

    /// Re-drive stored webhook events whose handler has not succeeded
    pub async fn replay_unprocessed(&self) -> Result<ReplaySummary> {
        Ok(self.pipeline.replay_unprocessed().await?)
    }

    /// Cancel an order that is still `created` or `pending`
    pub async fn cancel_order(&self, reference: &OrderRef, reason: Option<String>) -> Result<Order> {
        let outcome = self
            .orders
            .transition(reference, &Transition::cancelled(reason), Utc::now())
            .await?;

        match outcome {
            TransitionOutcome::Applied { from, order } => {
                info!(order_ref = %reference, from = %from, "Order cancelled");
                Ok(order)
            }
            TransitionOutcome::AlreadyInState(order) => Ok(order),
            TransitionOutcome::Rejected {
                current, reason, ..
            } => {
                debug!(order_ref = %reference, current = %current, "Cancellation refused");
                Err(PaylaneError::validation("status", reason))
            }
            TransitionOutcome::IntegrityConflict { bound, offered } => Err(
                PaylaneError::IntegrityConflict(format!("bound to {}, offered {}", bound, offered)),
            ),
        }
    }

    /// Stored order
    pub async fn order(&self, reference: &OrderRef) -> Result<Order> {
        self.require_order(reference).await
    }

    /// Order status as of now, reading a lapsed `pending` order as `expired`
    pub async fn order_status(&self, reference: &OrderRef) -> Result<OrderStatus> {
        self.order_status_at(reference, Utc::now()).await
    }

    /// Order status at an explicit time
    pub async fn order_status_at(
        &self,
        reference: &OrderRef,
        now: DateTime<Utc>,
    ) -> Result<OrderStatus> {
        Ok(self.require_order(reference).await?.effective_status(now))
    }

    async fn require_order(&self, reference: &OrderRef) -> Result<Order> {
        self.orders
            .get(reference)
            .await?
            .ok_or_else(|| PaylaneError::OrderNotFound(reference.to_string()))
    }

    /// Persist `expired` for pending orders past their expiry
    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0;
        for reference in self.orders.lapsed(now).await? {
            let outcome = self
                .orders
                .transition(&reference, &Transition::expired(), now)
                .await?;
            if outcome.is_applied() {
                expired += 1;
            }
        }
        if expired > 0 {
            info!(expired, "Expired stale orders");
        }
        Ok(expired)
    }

    /// Limiter cleanup followed by the expiry sweep
    ///
    /// Failures are logged; the next run tries again.
    pub async fn run_housekeeping(&self, now: DateTime<Utc>) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();
        let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or_default();

        match self.limiter.cleanup_at(now_ms).await {
            Ok(evicted) => report.evicted_rate_limits = evicted,
            Err(e) => warn!(error = %e, "Rate limit cleanup failed"),
        }
        match self.expire_stale_orders(now).await {
            Ok(expired) => report.expired_orders = expired,
            Err(e) => warn!(error = %e, "Order expiry sweep failed"),
        }
        report
    }

    /// Run housekeeping on a fixed interval until the handle is aborted
    pub fn spawn_housekeeping(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let report = self.run_housekeeping(Utc::now()).await;
                debug!(
                    evicted = report.evicted_rate_limits,
                    expired = report.expired_orders,
                    "Housekeeping run finished"
                );
            }
        })
    }

    // ------------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------------

    /// Clear violations and any block for a client
    pub async fn reset_violations(&self, identifier: &str) -> Result<bool> {
        Ok(self.limiter.reset_violations(identifier).await?)
    }

    /// Replace a provider's health metrics, returning the new score
    pub fn record_provider_health(&self, provider: &str, metrics: HealthMetrics) -> Result<f64> {
        Ok(self.registry.record_health(provider, metrics)?)
    }

    /// Enable or disable a provider for selection
    pub fn set_provider_enabled(&self, provider: &str, enabled: bool) -> Result<()> {
        Ok(self.registry.set_enabled(provider, enabled)?)
    }

    /// Score and health of every provider
    pub fn provider_snapshot(&self) -> Vec<ProviderStatus> {
        self.registry.snapshot()
    }

    /// Provider registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Order store
    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.orders
    }

    /// Rate limiter
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Webhook pipeline
    pub fn pipeline(&self) -> &WebhookPipeline {
        &self.pipeline
    }
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("providers", &self.registry.names())
            .field("gateways", &self.gateways.keys().collect::<Vec<_>>())
            .field("orders", &self.orders.store_type())
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SettlementEngine`]
pub struct SettlementEngineBuilder {
    registry: ProviderRegistry,
    gateways: Vec<Arc<dyn ProviderGateway>>,
    secrets: Vec<(String, SecretString)>,
    policy: RateLimitPolicy,
    redis_url: Option<String>,
    limiter_store: Option<Arc<dyn RateLimitStore>>,
    orders: Option<Arc<dyn OrderStore>>,
    events: Option<Arc<dyn WebhookEventStore>>,
    webhook_config: WebhookConfig,
    sink: Option<Arc<dyn NotificationSink>>,
    session_ttl: Duration,
}

impl SettlementEngineBuilder {
    /// Create a builder with in-memory stores and default policies
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::new(),
            gateways: Vec::new(),
            secrets: Vec::new(),
            policy: RateLimitPolicy::default(),
            redis_url: None,
            limiter_store: None,
            orders: None,
            events: None,
            webhook_config: WebhookConfig::default(),
            sink: None,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Providers and their initial health
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Gateway for one registered provider
    pub fn gateway(mut self, gateway: Arc<dyn ProviderGateway>) -> Self {
        self.gateways.push(gateway);
        self
    }

    /// Webhook signing secret for a provider
    pub fn webhook_secret(mut self, provider: impl Into<String>, secret: SecretString) -> Self {
        self.secrets.push((provider.into(), secret));
        self
    }

    /// Rate limit policy for operation requests
    pub fn rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep limiter state in Redis
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Custom limiter store
    pub fn limiter_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.limiter_store = Some(store);
        self
    }

    /// Custom order store
    pub fn order_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.orders = Some(store);
        self
    }

    /// Custom webhook event store
    pub fn event_store(mut self, store: Arc<dyn WebhookEventStore>) -> Self {
        self.events = Some(store);
        self
    }

    /// Webhook ingestion settings
    pub fn webhook_config(mut self, config: WebhookConfig) -> Self {
        self.webhook_config = config;
        self
    }

    /// Notification sink, logs by default
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// How long sessions stay open
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Build the engine
    ///
    /// Every registered provider needs a gateway and a webhook secret.
    pub async fn build(self) -> Result<SettlementEngine> {
        if self.registry.is_empty() {
            return Err(config_error("at least one provider must be registered"));
        }

        let mut gateways = HashMap::new();
        for gateway in self.gateways {
            let name = gateway.provider().to_ascii_lowercase();
            if !self.registry.contains(&name) {
                return Err(config_error(format!("gateway for unregistered provider {}", name)));
            }
            if gateways.insert(name.clone(), gateway).is_some() {
                return Err(config_error(format!("provider {} has two gateways", name)));
            }
        }

        for name in self.registry.names() {
            if !gateways.contains_key(name) {
                return Err(config_error(format!("provider {} has no gateway", name)));
            }
            if !self
                .secrets
                .iter()
                .any(|(provider, _)| provider.eq_ignore_ascii_case(name))
            {
                return Err(config_error(format!("provider {} has no webhook secret", name)));
            }
        }

        let session_ttl = chrono::Duration::from_std(self.session_ttl)
            .ok()
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| config_error("session ttl must be positive"))?;

        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let registry = Arc::new(self.registry);
        let orders = self
            .orders
            .unwrap_or_else(|| Arc::new(MemoryOrderStore::new()));

        let mut limiter = RateLimiter::builder()
            .policy(self.policy)
            .observer(Arc::new(ViolationNotifier::new(sink.clone())));
        limiter = match (self.limiter_store, self.redis_url) {
            (Some(store), _) => limiter.store(store),
            #[cfg(feature = "redis")]
            (None, Some(url)) => limiter.redis_store(&url),
            #[cfg(not(feature = "redis"))]
            (None, Some(_)) => {
                return Err(config_error(
                    "PAYLANE_RATE_LIMIT_REDIS_URL requires the redis feature",
                ));
            }
            (None, None) => limiter.memory_store(),
        };
        let limiter = Arc::new(limiter.build().await?);

        let mut pipeline = WebhookPipeline::builder()
            .config(self.webhook_config)
            .router(order_router(orders.clone(), sink.clone()))
            .observer(Arc::new(IngestFeedback {
                registry: registry.clone(),
                sink: sink.clone(),
            }));
        if let Some(events) = self.events {
            pipeline = pipeline.store(events);
        }
        for (provider, secret) in self.secrets {
            pipeline = pipeline.provider(provider, secret);
        }
        let pipeline = pipeline.build()?;

        info!(
            providers = registry.len(),
            orders = orders.store_type(),
            "Settlement engine ready"
        );

        Ok(SettlementEngine {
            limiter,
            registry,
            gateways,
            orders,
            pipeline,
            sink,
            session_ttl,
        })
    }
}

impl Default for SettlementEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn config_error(message: impl Into<String>) -> PaylaneError {
    PaylaneError::Config(ConfigError::ValidationError(message.into()))
}
