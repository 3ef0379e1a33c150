//! Order lifecycle for Paylane
//!
//! An [`Order`] tracks one financial operation from creation to its outcome.
//! Status changes go through [`Transition`]s, which stores apply as
//! conditional updates: the change happens only if the current status is an
//! allowed predecessor of the target. Duplicate or late provider events
//! therefore become no-ops instead of errors.
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use paylane_orders::{Amount, Order, OrderStatus, Transition};
//! use paylane_providers::{Capability, Decimal};
//!
//! let now = Utc::now();
//! let mut order = Order::new(
//!     Capability::Payout,
//!     "nium",
//!     Amount::new(Decimal::from(250), "EUR"),
//!     Duration::minutes(30),
//!     now,
//! );
//!
//! assert!(Transition::accepted("nium_tx_1").apply(&mut order, now).is_applied());
//! assert!(Transition::completed().apply(&mut order, now).is_applied());
//! assert!(!Transition::completed().apply(&mut order, now).is_applied());
//! assert_eq!(order.status, OrderStatus::Completed);
//! ```

mod error;
mod order;
mod reference;
mod status;
pub mod store;
mod transition;

pub use error::{OrderError, OrderResult};
pub use order::{Amount, Order};
pub use reference::OrderRef;
pub use status::OrderStatus;
pub use store::{MemoryOrderStore, OrderStore};
pub use transition::{CANCEL_REASON_KEY, FAILURE_REASON_KEY, Transition, TransitionOutcome};
