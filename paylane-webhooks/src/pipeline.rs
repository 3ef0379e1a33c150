//! The ingestion pipeline
//!
//! Every delivery goes through the same steps:
//!
//! 1. authenticate the raw body against the provider's secret
//! 2. parse the envelope (id and type are required)
//! 3. insert the event record, which doubles as the deduplication check
//! 4. dispatch to the handler registered for the event type
//! 5. write the terminal state of the record
//! 6. report the outcome to the observer
//!
//! Records are persisted before the handler runs, so a crash mid-handler
//! leaves an unprocessed record that [`WebhookPipeline::replay_unprocessed`]
//! can re-drive later.

use crate::store::{InsertOutcome, MemoryEventStore, WebhookEventStore};
use crate::{
    HandlerOutcome, InboundEvent, Result, WebhookConfig, WebhookEnvelope, WebhookError,
    WebhookEvent, WebhookEventType, WebhookHeaders, WebhookReceiver, WebhookRouter,
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Final state of one delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// A handler ran and the record is processed
    Processed(HandlerOutcome),
    /// No handler for the type; acknowledged and marked processed
    Ignored,
    /// The event was seen before and is not retried
    Duplicate,
    /// Authentication failed
    Rejected(String),
    /// The body could not be used
    Malformed(String),
    /// The handler failed; the record stays unprocessed
    HandlerFailed(String),
    /// The event store failed
    StoreFailed(String),
}

impl IngestOutcome {
    /// HTTP status to answer the provider with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Processed(_) | Self::Ignored | Self::Duplicate => 200,
            Self::Rejected(_) => 401,
            Self::Malformed(_) => 400,
            Self::HandlerFailed(_) | Self::StoreFailed(_) => 500,
        }
    }

    /// Whether the provider should consider the delivery done
    pub fn is_acknowledged(&self) -> bool {
        self.status_code() == 200
    }

    /// Transport-neutral response
    pub fn to_response(&self) -> WebhookResponse {
        let body = match self {
            Self::Processed(_) | Self::Ignored | Self::Duplicate => {
                serde_json::json!({ "received": true, "outcome": self })
            }
            _ => serde_json::json!({ "received": false, "outcome": self }),
        };

        WebhookResponse {
            status: self.status_code(),
            body,
        }
    }
}

/// Response handed back to whichever transport delivered the webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookResponse {
    /// HTTP status
    pub status: u16,
    /// JSON body
    pub body: serde_json::Value,
}

/// What the observer learns about each delivery or replay
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Provider the delivery claimed to come from
    pub provider: String,
    /// Event id, once the body was parsed
    pub event_id: Option<String>,
    /// Canonical event type, once the body was parsed
    pub event_type: Option<WebhookEventType>,
    /// Final outcome
    pub outcome: IngestOutcome,
    /// Time spent in the pipeline
    pub elapsed: Duration,
    /// The handler was re-driven by a replay rather than a delivery
    pub replayed: bool,
}

/// Receives a report for every delivery and replayed event
pub trait PipelineObserver: Send + Sync {
    /// Must not block and must not fail
    fn on_ingest(&self, report: &IngestReport);
}

/// Counts from a replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Records whose handler now succeeded
    pub processed: usize,
    /// Records whose handler failed again
    pub failed: usize,
    /// Records left alone (in flight, or claimed elsewhere)
    pub skipped: usize,
}

/// Authenticating, deduplicating webhook ingestion
pub struct WebhookPipeline {
    receivers: HashMap<String, WebhookReceiver>,
    store: Arc<dyn WebhookEventStore>,
    router: WebhookRouter,
    observer: Option<Arc<dyn PipelineObserver>>,
    config: WebhookConfig,
}

impl WebhookPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> WebhookPipelineBuilder {
        WebhookPipelineBuilder::new()
    }

    /// Ingest a delivery at the current time
    pub async fn ingest(
        &self,
        provider: &str,
        headers: &WebhookHeaders,
        payload: &[u8],
    ) -> IngestOutcome {
        self.ingest_at(provider, headers, payload, Utc::now()).await
    }

    /// Ingest a delivery at an explicit time
    pub async fn ingest_at(
        &self,
        provider: &str,
        headers: &WebhookHeaders,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        let started = Instant::now();
        let provider = normalize(provider);
        let (outcome, envelope) = self.run(&provider, headers, payload, now).await;
        self.report(&provider, envelope.as_ref(), &outcome, started.elapsed(), false);
        outcome
    }

    async fn run(
        &self,
        provider: &str,
        headers: &WebhookHeaders,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> (IngestOutcome, Option<WebhookEnvelope>) {
        let Some(receiver) = self.receivers.get(provider) else {
            warn!(provider = %provider, "Webhook from unknown provider rejected");
            let error = WebhookError::UnknownProvider(provider.to_string());
            return (IngestOutcome::Rejected(error.to_string()), None);
        };

        if payload.len() > self.config.max_payload_size {
            warn!(provider = %provider, size = payload.len(), "Webhook payload too large");
            return (
                IngestOutcome::Malformed(format!("payload exceeds {} bytes", self.config.max_payload_size)),
                None,
            );
        }

        let signature = match receiver.authenticate(payload, headers, now) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Webhook signature rejected");
                return (IngestOutcome::Rejected(e.to_string()), None);
            }
        };

        let envelope = match WebhookEnvelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Malformed webhook payload");
                return (IngestOutcome::Malformed(e.to_string()), None);
            }
        };

        let record = WebhookEvent::new(provider, &envelope, signature, payload, now);
        match self.store.insert(record).await {
            Ok(InsertOutcome::Inserted) => {
                debug!(provider = %provider, event_id = %envelope.id, "New webhook event");
            }
            Ok(InsertOutcome::Exists(_)) => {
                match self
                    .store
                    .claim(provider, &envelope.id, now, self.config.stuck_after_chrono())
                    .await
                {
                    Ok(true) => {
                        info!(provider = %provider, event_id = %envelope.id, "Retrying unprocessed webhook event");
                    }
                    Ok(false) => {
                        info!(provider = %provider, event_id = %envelope.id, "Duplicate webhook event acknowledged");
                        return (IngestOutcome::Duplicate, Some(envelope));
                    }
                    Err(e) => {
                        error!(provider = %provider, event_id = %envelope.id, error = %e, "Event store failed");
                        return (IngestOutcome::StoreFailed(e.to_string()), Some(envelope));
                    }
                }
            }
            Err(e) => {
                error!(provider = %provider, event_id = %envelope.id, error = %e, "Event store failed");
                return (IngestOutcome::StoreFailed(e.to_string()), Some(envelope));
            }
        }

        let outcome = self.dispatch(provider, envelope.clone(), now).await;
        (outcome, Some(envelope))
    }

    async fn dispatch(
        &self,
        provider: &str,
        envelope: WebhookEnvelope,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        let event = InboundEvent::new(provider, envelope).at(now);

        let Some(handler) = self.router.route(&event.kind) else {
            info!(
                provider = %provider,
                event_id = %event.event_id(),
                event_type = %event.kind,
                "No handler for webhook event type, acknowledging"
            );
            return match self.store.mark_processed(provider, event.event_id(), now).await {
                Ok(_) => IngestOutcome::Ignored,
                Err(e) => IngestOutcome::StoreFailed(e.to_string()),
            };
        };

        match handler.handle(&event).await {
            Ok(outcome) => {
                if let HandlerOutcome::Conflict(reason) = &outcome {
                    error!(
                        provider = %provider,
                        event_id = %event.event_id(),
                        event_type = %event.kind,
                        reason = %reason,
                        "Webhook conflicts with stored order, not applied"
                    );
                } else {
                    debug!(
                        provider = %provider,
                        event_id = %event.event_id(),
                        outcome = ?outcome,
                        "Webhook event handled"
                    );
                }

                match self.store.mark_processed(provider, event.event_id(), now).await {
                    Ok(_) => IngestOutcome::Processed(outcome),
                    Err(e) => IngestOutcome::StoreFailed(e.to_string()),
                }
            }
            Err(e) => {
                error!(
                    provider = %provider,
                    event_id = %event.event_id(),
                    event_type = %event.kind,
                    error = %e,
                    "Webhook handler failed"
                );
                if let Err(store_error) = self
                    .store
                    .mark_failed(provider, event.event_id(), &e.to_string())
                    .await
                {
                    error!(error = %store_error, "Could not record handler failure");
                }
                IngestOutcome::HandlerFailed(e.to_string())
            }
        }
    }

    /// Re-drive every unprocessed record that is failed or stuck
    pub async fn replay_unprocessed(&self) -> Result<ReplaySummary> {
        self.replay_unprocessed_at(Utc::now()).await
    }

    /// Replay as of an explicit time
    pub async fn replay_unprocessed_at(&self, now: DateTime<Utc>) -> Result<ReplaySummary> {
        let stuck_after = self.config.stuck_after_chrono();
        let mut summary = ReplaySummary::default();

        for record in self.store.unprocessed().await? {
            if !record.is_retryable(now, stuck_after)
                || !self
                    .store
                    .claim(&record.provider, &record.event_id, now, stuck_after)
                    .await?
            {
                summary.skipped += 1;
                continue;
            }

            let envelope = match record.envelope() {
                Ok(envelope) => envelope,
                Err(e) => {
                    self.store
                        .mark_failed(&record.provider, &record.event_id, &e.to_string())
                        .await?;
                    summary.failed += 1;
                    continue;
                }
            };

            let started = Instant::now();
            let outcome = self.dispatch(&record.provider, envelope.clone(), now).await;
            self.report(&record.provider, Some(&envelope), &outcome, started.elapsed(), true);

            if outcome.is_acknowledged() {
                summary.processed += 1;
            } else {
                summary.failed += 1;
            }
        }

        if summary != ReplaySummary::default() {
            info!(
                processed = summary.processed,
                failed = summary.failed,
                skipped = summary.skipped,
                "Webhook replay finished"
            );
        }

        Ok(summary)
    }

    fn report(
        &self,
        provider: &str,
        envelope: Option<&WebhookEnvelope>,
        outcome: &IngestOutcome,
        elapsed: Duration,
        replayed: bool,
    ) {
        let Some(observer) = &self.observer else {
            return;
        };

        observer.on_ingest(&IngestReport {
            provider: provider.to_string(),
            event_id: envelope.map(|e| e.id.clone()),
            event_type: envelope.map(WebhookEnvelope::kind),
            outcome: outcome.clone(),
            elapsed,
            replayed,
        });
    }

    /// The event store
    pub fn store(&self) -> &Arc<dyn WebhookEventStore> {
        &self.store
    }

    /// Providers with a registered secret
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.receivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get the configuration
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }
}

impl std::fmt::Debug for WebhookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookPipeline")
            .field("providers", &self.providers())
            .field("store", &self.store.store_type())
            .field("router", &self.router)
            .field("config", &self.config)
            .finish()
    }
}

fn normalize(provider: &str) -> String {
    provider.trim().to_ascii_lowercase()
}

/// Builder for a WebhookPipeline
#[derive(Default)]
pub struct WebhookPipelineBuilder {
    config: WebhookConfig,
    secrets: Vec<(String, SecretString)>,
    store: Option<Arc<dyn WebhookEventStore>>,
    router: WebhookRouter,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl WebhookPipelineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider's shared secret
    pub fn provider(mut self, name: impl AsRef<str>, secret: SecretString) -> Self {
        self.secrets.push((normalize(name.as_ref()), secret));
        self
    }

    /// Set the configuration
    pub fn config(mut self, config: WebhookConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the event store (defaults to in-memory)
    pub fn store(mut self, store: Arc<dyn WebhookEventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the handler router
    pub fn router(mut self, router: WebhookRouter) -> Self {
        self.router = router;
        self
    }

    /// Set the outcome observer
    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<WebhookPipeline> {
        if self.config.timestamp_tolerance.is_zero() {
            return Err(WebhookError::ConfigError(
                "timestamp tolerance must be non-zero".to_string(),
            ));
        }

        let mut receivers = HashMap::new();
        for (name, secret) in self.secrets {
            if name.is_empty() {
                return Err(WebhookError::ConfigError("provider name is empty".to_string()));
            }
            let receiver =
                WebhookReceiver::new(secret).with_tolerance(self.config.timestamp_tolerance);
            if receivers.insert(name.clone(), receiver).is_some() {
                return Err(WebhookError::ConfigError(format!(
                    "provider {} registered twice",
                    name
                )));
            }
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryEventStore::new()));

        debug!(
            providers = receivers.len(),
            handlers = self.router.len(),
            store = store.store_type(),
            "Building webhook pipeline"
        );

        Ok(WebhookPipeline {
            receivers,
            store,
            router: self.router,
            observer: self.observer,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebhookHandler;
    use crate::WebhookSignature;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &str = "whsec_nium";

    struct Counting {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl Counting {
        fn new(fail_first: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookHandler for Counting {
        async fn handle(&self, _event: &InboundEvent) -> Result<HandlerOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(WebhookError::handler("database unavailable"));
            }
            Ok(HandlerOutcome::Applied)
        }
    }

    fn pipeline(handler: Arc<Counting>) -> WebhookPipeline {
        WebhookPipeline::builder()
            .provider("NIUM", SecretString::from(SECRET.to_string()))
            .router(WebhookRouter::new().on(WebhookEventType::TransactionCompleted, handler))
            .build()
            .unwrap()
    }

    fn signed(body: &[u8], now: DateTime<Utc>) -> WebhookHeaders {
        let signer = WebhookSignature::new(SecretString::from(SECRET.to_string()));
        WebhookHeaders::signed(&signer, now.timestamp(), body)
    }

    const BODY: &[u8] = br#"{"id":"E1","type":"transaction.completed","data":{"order_ref":"O1"}}"#;

    #[tokio::test]
    async fn test_first_delivery_processed() {
        let handler = Counting::new(0);
        let pipeline = pipeline(handler.clone());
        let now = Utc::now();

        let outcome = pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;
        assert_eq!(outcome, IngestOutcome::Processed(HandlerOutcome::Applied));
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(handler.calls(), 1);

        let record = pipeline.store().get("nium", "E1").await.unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.processed_at, Some(now));
    }

    #[tokio::test]
    async fn test_handler_sees_delivery_time() {
        struct Clock(parking_lot::Mutex<Vec<DateTime<Utc>>>);

        #[async_trait]
        impl WebhookHandler for Clock {
            async fn handle(&self, event: &InboundEvent) -> Result<HandlerOutcome> {
                self.0.lock().push(event.received_at);
                Ok(HandlerOutcome::Applied)
            }
        }

        let clock = Arc::new(Clock(parking_lot::Mutex::new(Vec::new())));
        let pipeline = WebhookPipeline::builder()
            .provider("nium", SecretString::from(SECRET.to_string()))
            .router(WebhookRouter::new().on(WebhookEventType::TransactionCompleted, clock.clone()))
            .build()
            .unwrap();
        let delivered = Utc::now() - chrono::Duration::hours(3);

        pipeline
            .ingest_at("nium", &signed(BODY, delivered), BODY, delivered)
            .await;

        assert_eq!(*clock.0.lock(), vec![delivered]);
    }

    #[tokio::test]
    async fn test_redelivery_is_duplicate() {
        let handler = Counting::new(0);
        let pipeline = pipeline(handler.clone());
        let now = Utc::now();

        for _ in 0..3 {
            let outcome = pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;
            assert!(outcome.is_acknowledged());
        }

        assert_eq!(handler.calls(), 1);
        let unprocessed = pipeline.store().unprocessed().await.unwrap();
        assert!(unprocessed.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let handler = Counting::new(0);
        let pipeline = pipeline(handler.clone());
        let now = Utc::now();

        let headers = WebhookHeaders::new()
            .with("X-Webhook-Signature", "00".repeat(32))
            .with("X-Webhook-Timestamp", now.timestamp().to_string());
        let outcome = pipeline.ingest_at("nium", &headers, BODY, now).await;

        assert!(matches!(outcome, IngestOutcome::Rejected(_)));
        assert_eq!(outcome.status_code(), 401);
        assert_eq!(handler.calls(), 0);
        assert!(pipeline.store().get("nium", "E1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let pipeline = pipeline(Counting::new(0));
        let now = Utc::now();

        let outcome = pipeline.ingest_at("acme", &signed(BODY, now), BODY, now).await;
        assert_eq!(outcome.status_code(), 401);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let pipeline = pipeline(Counting::new(0));
        let now = Utc::now();
        let body = br#"{"type":"transaction.completed"}"#;

        let outcome = pipeline.ingest_at("nium", &signed(body, now), body, now).await;
        assert_eq!(outcome.status_code(), 400);
        assert!(pipeline.store().unprocessed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let pipeline = WebhookPipeline::builder()
            .provider("nium", SecretString::from(SECRET.to_string()))
            .config(WebhookConfig::builder().max_payload_size(16).build())
            .build()
            .unwrap();
        let now = Utc::now();

        let outcome = pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;
        assert!(matches!(outcome, IngestOutcome::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unknown_type_acknowledged() {
        let handler = Counting::new(0);
        let pipeline = pipeline(handler.clone());
        let now = Utc::now();
        let body = br#"{"id":"E9","type":"kyc.updated"}"#;

        let outcome = pipeline.ingest_at("nium", &signed(body, now), body, now).await;
        assert_eq!(outcome, IngestOutcome::Ignored);
        assert_eq!(handler.calls(), 0);

        let record = pipeline.store().get("nium", "E9").await.unwrap().unwrap();
        assert!(record.processed);
    }

    #[tokio::test]
    async fn test_handler_failure_then_redelivery_retries() {
        let handler = Counting::new(1);
        let pipeline = pipeline(handler.clone());
        let now = Utc::now();

        let first = pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;
        assert!(matches!(first, IngestOutcome::HandlerFailed(_)));
        assert_eq!(first.status_code(), 500);

        let record = pipeline.store().get("nium", "E1").await.unwrap().unwrap();
        assert!(!record.processed);
        assert_eq!(record.error.as_deref(), Some("Handler failed: database unavailable"));

        let second = pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;
        assert_eq!(second, IngestOutcome::Processed(HandlerOutcome::Applied));
        assert_eq!(handler.calls(), 2);

        let record = pipeline.store().get("nium", "E1").await.unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn test_replay_unprocessed() {
        let handler = Counting::new(1);
        let pipeline = pipeline(handler.clone());
        let now = Utc::now();

        pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;

        let summary = pipeline.replay_unprocessed_at(now).await.unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                processed: 1,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(handler.calls(), 2);

        let summary = pipeline.replay_unprocessed_at(now).await.unwrap();
        assert_eq!(summary, ReplaySummary::default());
    }

    #[tokio::test]
    async fn test_replay_skips_fresh_in_flight_records() {
        let pipeline = pipeline(Counting::new(0));
        let now = Utc::now();
        let envelope = WebhookEnvelope::parse(BODY).unwrap();

        // A record left behind by a crash mid-handler
        pipeline
            .store()
            .insert(WebhookEvent::new("nium", &envelope, "sig", BODY, now))
            .await
            .unwrap();

        let summary = pipeline.replay_unprocessed_at(now).await.unwrap();
        assert_eq!(summary.skipped, 1);

        let later = now + chrono::Duration::minutes(11);
        let summary = pipeline.replay_unprocessed_at(later).await.unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn test_observer_sees_outcomes() {
        struct Recorder(parking_lot::Mutex<Vec<IngestReport>>);

        impl PipelineObserver for Recorder {
            fn on_ingest(&self, report: &IngestReport) {
                self.0.lock().push(report.clone());
            }
        }

        let recorder = Arc::new(Recorder(parking_lot::Mutex::new(Vec::new())));
        let pipeline = WebhookPipeline::builder()
            .provider("nium", SecretString::from(SECRET.to_string()))
            .router(WebhookRouter::new().on(WebhookEventType::TransactionCompleted, Counting::new(0)))
            .observer(recorder.clone())
            .build()
            .unwrap();
        let now = Utc::now();

        pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;
        pipeline.ingest_at("nium", &signed(BODY, now), BODY, now).await;

        let reports = recorder.0.lock();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].event_id.as_deref(), Some("E1"));
        assert_eq!(reports[0].event_type, Some(WebhookEventType::TransactionCompleted));
        assert_eq!(reports[1].outcome, IngestOutcome::Duplicate);
        assert!(!reports[1].replayed);
    }

    #[test]
    fn test_response_body() {
        let response = IngestOutcome::Duplicate.to_response();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["received"], true);
        assert_eq!(response.body["outcome"]["status"], "duplicate");

        let response = IngestOutcome::Rejected("Signature mismatch".into()).to_response();
        assert_eq!(response.status, 401);
        assert_eq!(response.body["outcome"]["detail"], "Signature mismatch");
    }

    #[test]
    fn test_builder_rejects_duplicate_provider() {
        let result = WebhookPipeline::builder()
            .provider("nium", SecretString::from("a".to_string()))
            .provider("Nium", SecretString::from("b".to_string()))
            .build();
        assert!(matches!(result, Err(WebhookError::ConfigError(_))));
    }
}
