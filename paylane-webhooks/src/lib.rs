//! Provider webhook ingestion for Paylane
//!
//! This crate accepts provider callbacks and applies each logical event
//! at most once, no matter how often the provider redelivers it.
//!
//! # Features
//!
//! - **Signature Verification**: HMAC-SHA256 over `"{timestamp}.{body}"`,
//!   constant-time comparison and a replay window
//! - **Deduplication**: event records unique per `(provider, event_id)`,
//!   enforced by the store
//! - **Persist-then-process**: records exist before handlers run, so failed
//!   or interrupted events can be replayed
//! - **Typed Routing**: handlers registered per canonical event type, unknown
//!   types acknowledged without side effects
//!
//! # Example
//!
//! ```rust,no_run
//! use paylane_webhooks::{WebhookHeaders, WebhookPipeline, WebhookRouter};
//! use secrecy::SecretString;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = WebhookPipeline::builder()
//!     .provider("nium", SecretString::from("whsec_...".to_string()))
//!     .router(WebhookRouter::new())
//!     .build()?;
//!
//! let headers = WebhookHeaders::new()
//!     .with("X-Webhook-Signature", "sha256=...")
//!     .with("X-Webhook-Timestamp", "1700000000");
//! let outcome = pipeline.ingest("nium", &headers, br#"{"id":"evt_1","type":"ping"}"#).await;
//! println!("answer with {}", outcome.status_code());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod event;
mod pipeline;
mod receiver;
mod router;
mod signature;
pub mod store;

pub use config::{WebhookConfig, WebhookConfigBuilder};
pub use error::WebhookError;
pub use event::{WebhookEnvelope, WebhookEvent, WebhookEventType};
pub use pipeline::{
    IngestOutcome, IngestReport, PipelineObserver, ReplaySummary, WebhookPipeline,
    WebhookPipelineBuilder, WebhookResponse,
};
pub use receiver::{WebhookHeaders, WebhookReceiver};
pub use router::{HandlerOutcome, InboundEvent, WebhookHandler, WebhookRouter};
pub use signature::{SIGNATURE_SCHEME, WebhookSignature, headers};
pub use store::{InsertOutcome, MemoryEventStore, WebhookEventStore};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
