//! Order lifecycle
//!
//! ```text
//! created ──> pending ──> completed | failed | expired
//!    │           │
//!    └───────────┴──> cancelled
//! ```
//!
//! The four right-hand states are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Recorded, provider has not accepted yet
    Created,
    /// Accepted by the provider, waiting for the outcome
    Pending,
    /// Provider reported success
    Completed,
    /// Provider reported failure or decline
    Failed,
    /// Expired before completing
    Expired,
    /// Cancelled by a user or operator
    Cancelled,
}

impl OrderStatus {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no transition may leave this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Expired | Self::Cancelled
        )
    }

    /// Statuses this one may be entered from
    pub fn predecessors(&self) -> &'static [OrderStatus] {
        match self {
            Self::Created => &[],
            Self::Pending => &[Self::Created],
            Self::Completed | Self::Failed | Self::Expired => &[Self::Pending],
            Self::Cancelled => &[Self::Created, Self::Pending],
        }
    }

    /// Whether `self -> target` is a legal transition
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        target.predecessors().contains(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown order status: {}", s)),
        }
    }
}
