//! Conditional status transitions
//!
//! A [`Transition`] names the target status plus whatever the triggering
//! event carried. Stores apply it under the order's own lock, so the
//! predecessor check and the write cannot be split by a concurrent delivery.

use crate::{Order, OrderStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata key holding a failure reason
pub const FAILURE_REASON_KEY: &str = "failure_reason";

/// Metadata key holding a cancellation reason
pub const CANCEL_REASON_KEY: &str = "cancel_reason";

/// A requested status change
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Target status
    pub target: OrderStatus,
    /// Provider-side id to bind, if the event carried one
    pub external_id: Option<String>,
    /// Metadata merged into the order when applied
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Raw provider payload kept for audit
    pub payload: Option<String>,
}

impl Transition {
    /// Transition to `target`
    pub fn to(target: OrderStatus) -> Self {
        Self {
            target,
            external_id: None,
            metadata: serde_json::Map::new(),
            payload: None,
        }
    }

    /// Provider accepted the request
    pub fn accepted(external_id: impl Into<String>) -> Self {
        Self::to(OrderStatus::Pending).external_id(external_id)
    }

    /// Provider completed the order
    pub fn completed() -> Self {
        Self::to(OrderStatus::Completed)
    }

    /// Provider failed or declined the order
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::to(OrderStatus::Failed).metadata(FAILURE_REASON_KEY, reason.into())
    }

    /// Order expired
    pub fn expired() -> Self {
        Self::to(OrderStatus::Expired)
    }

    /// Order cancelled by a user or operator
    pub fn cancelled(reason: Option<String>) -> Self {
        let transition = Self::to(OrderStatus::Cancelled);
        match reason {
            Some(reason) => transition.metadata(CANCEL_REASON_KEY, reason),
            None => transition,
        }
    }

    /// Bind a provider-side id
    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Add a metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Keep the raw payload that triggered the transition
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Apply to an order in place
    pub fn apply(&self, order: &mut Order, now: DateTime<Utc>) -> TransitionOutcome {
        if let (Some(bound), Some(offered)) = (&order.external_id, &self.external_id) {
            if bound != offered {
                return TransitionOutcome::IntegrityConflict {
                    bound: bound.clone(),
                    offered: offered.clone(),
                };
            }
        }

        // An expiry event may still store the status a reader already sees
        let current = if self.target == OrderStatus::Expired {
            order.status
        } else {
            order.effective_status(now)
        };

        if current == self.target {
            return TransitionOutcome::AlreadyInState(order.clone());
        }

        if !current.can_transition_to(self.target) {
            return TransitionOutcome::Rejected {
                current,
                target: self.target,
                reason: format!("{} cannot move to {}", current, self.target),
            };
        }

        if self.target == OrderStatus::Completed
            && order.external_id.is_none()
            && self.external_id.is_none()
        {
            return TransitionOutcome::Rejected {
                current,
                target: self.target,
                reason: "completion requires a provider external id".to_string(),
            };
        }

        let from = order.status;
        order.status = self.target;
        if order.external_id.is_none() {
            order.external_id = self.external_id.clone();
        }
        for (key, value) in &self.metadata {
            order.metadata.insert(key.clone(), value.clone());
        }
        if self.payload.is_some() {
            order.last_payload = self.payload.clone();
        }
        order.updated_at = now;

        TransitionOutcome::Applied {
            from,
            order: order.clone(),
        }
    }
}

/// Result of a conditional transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// Status changed
    Applied {
        /// Status before the change
        from: OrderStatus,
        /// Order after the change
        order: Order,
    },
    /// Target already reached, nothing changed
    AlreadyInState(Order),
    /// Current status does not allow the target
    Rejected {
        /// Status the order is in
        current: OrderStatus,
        /// Status that was requested
        target: OrderStatus,
        /// Why the transition was refused
        reason: String,
    },
    /// The event tried to bind a different external id than the bound one
    IntegrityConflict {
        /// External id already bound to the order
        bound: String,
        /// External id carried by the event
        offered: String,
    },
}

impl TransitionOutcome {
    /// Whether the order changed
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Order state after the attempt, when the outcome carries it
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Applied { order, .. } | Self::AlreadyInState(order) => Some(order),
            _ => None,
        }
    }
}
