//! # Paylane
//!
//! Provider orchestration and settlement engine.
//!
//! Paylane routes financial operations (on/off-ramp sessions, payouts, IBAN
//! issuance) to one of several third-party providers and tracks each one
//! through the provider callbacks that settle it:
//!
//! - **Provider selection**: composite health scores, deterministic best
//!   provider per capability, failover suggestions ([`providers`])
//! - **Webhook ingestion**: HMAC-signed, deduplicated, persisted before the
//!   handler runs ([`webhooks`])
//! - **Rate limiting**: fixed windows with progressive blocking ([`ratelimit`])
//! - **Orders**: a monotonic state machine with conditional transitions ([`orders`])
//!
//! [`SettlementEngine`] wires these together.
//!
//! ## Quick Start
//!
//! ```no_run
//! use paylane::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> paylane::Result<()> {
//! let settings = Settings::from_env()?;
//! init_tracing(&settings.log);
//!
//! let engine = Arc::new(SettlementEngine::from_settings(&settings).await?);
//! engine.clone().spawn_housekeeping(Duration::from_secs(60));
//!
//! let started = engine
//!     .start_operation(
//!         &ClientContext::new("203.0.113.5").endpoint("/operations"),
//!         OperationRequest::new(Capability::Payout, Decimal::new(2500, 2), "GBP"),
//!     )
//!     .await?;
//! println!("{} via {}", started.order_ref, started.provider);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod settings;
pub mod telemetry;

pub use engine::{
    ClientContext, DEFAULT_SESSION_TTL, HousekeepingReport, OperationRequest, OperationStarted,
    SettlementEngine, SettlementEngineBuilder,
};
pub use error::{ErrorBody, PaylaneError, Result};
pub use handlers::{OrderTransitionHandler, order_router};
pub use notify::{
    MemorySink, Notification, NotificationKind, NotificationSink, Severity, TracingSink,
    ViolationNotifier,
};
pub use settings::{ProviderSettings, RateLimitSettings, Settings};
pub use telemetry::{LogFormat, LogSettings, init_tracing};

// Component crates
pub use paylane_config as config;
pub use paylane_orders as orders;
pub use paylane_providers as providers;
pub use paylane_ratelimit as ratelimit;
pub use paylane_webhooks as webhooks;

/// Prelude for common imports
pub mod prelude {
    pub use crate::engine::{ClientContext, OperationRequest, OperationStarted, SettlementEngine};
    pub use crate::error::{PaylaneError, Result};
    pub use crate::notify::{Notification, NotificationSink};
    pub use crate::settings::Settings;
    pub use crate::telemetry::init_tracing;
    pub use paylane_orders::{Order, OrderRef, OrderStatus};
    pub use paylane_providers::{Capability, Decimal, ProviderGateway};
    pub use paylane_webhooks::{IngestOutcome, WebhookHeaders};
}
