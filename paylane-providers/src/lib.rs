//! Provider scoring, selection and gateways for Paylane
//!
//! Providers are ranked per [`Capability`] by a fixed weighted score over
//! uptime, response time and success rate. The registry answers two
//! questions: which provider should take a new operation, and which one to
//! fall back to once a provider has been ruled out.
//!
//! # Example
//!
//! ```rust
//! use paylane_providers::{Capability, HealthMetrics, ProviderDescriptor, ProviderRegistry};
//!
//! let registry = ProviderRegistry::from_descriptors([
//!     ProviderDescriptor::new("nium", [Capability::Payout])
//!         .with_metrics(HealthMetrics::new(100.0, 200.0, 100.0)),
//!     ProviderDescriptor::new("openpayd", [Capability::Payout])
//!         .with_metrics(HealthMetrics::new(50.0, 0.0, 100.0)),
//! ])
//! .unwrap();
//!
//! assert_eq!(registry.best_provider(Capability::Payout).unwrap(), "nium");
//! assert_eq!(
//!     registry.failover_provider(Capability::Payout, "nium").as_deref(),
//!     Some("openpayd")
//! );
//! ```

mod capability;
mod error;
mod gateway;
mod health;
mod registry;

pub use capability::Capability;
pub use error::{ProviderError, ProviderResult};
pub use gateway::{DEFAULT_TIMEOUT, HttpGateway, ProviderGateway, ProviderSession, SessionRequest};
pub use health::{
    HealthMetrics, Observation, Outcome, compute_score, normalize_latency, LATENCY_CEILING_MS,
};
pub use registry::{
    DEFAULT_MIN_HEALTHY_SCORE, ProviderDescriptor, ProviderRegistry, ProviderStatus,
};

/// Re-export of the decimal type used for amounts
pub use rust_decimal::Decimal;
