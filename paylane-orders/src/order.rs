//! The order record

use crate::{OrderRef, OrderStatus};
use chrono::{DateTime, Duration, Utc};
use paylane_providers::Capability;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Amount with its currency or asset code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Value in major units
    pub value: Decimal,
    /// ISO currency or asset code
    pub currency: String,
}

impl Amount {
    /// Create an amount
    pub fn new(value: Decimal, currency: impl Into<String>) -> Self {
        Self {
            value,
            currency: currency.into().to_ascii_uppercase(),
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// One financial operation tracked from creation to its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Internal reference
    pub reference: OrderRef,
    /// Requested operation
    pub capability: Capability,
    /// Provider handling the order
    pub provider: String,
    /// Provider-side identifier, immutable once bound
    pub external_id: Option<String>,
    /// Stored status
    pub status: OrderStatus,
    /// Requested amount
    pub amount: Amount,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Pending orders past this instant are expired
    pub expires_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Free-form audit data (failure reasons, provider hints)
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Raw body of the last provider payload applied
    #[serde(default)]
    pub last_payload: Option<String>,
}

impl Order {
    /// Create an order in `created`
    pub fn new(
        capability: Capability,
        provider: impl Into<String>,
        amount: Amount,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reference: OrderRef::generate(),
            capability,
            provider: provider.into().to_ascii_lowercase(),
            external_id: None,
            status: OrderStatus::Created,
            amount,
            created_at: now,
            expires_at: now + ttl,
            updated_at: now,
            metadata: serde_json::Map::new(),
            last_payload: None,
        }
    }

    /// Status as seen at `now`
    ///
    /// A `pending` order past its expiry reads as `expired` whether or not a
    /// sweep has stored that yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> OrderStatus {
        if self.is_lapsed(now) {
            OrderStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether the stored status is `pending` but the expiry has passed
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && now > self.expires_at
    }

    /// Metadata value as a string
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}
