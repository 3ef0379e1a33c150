//! Order storage
//!
//! Stores own the conditional-update guarantee: a transition is checked and
//! written while the order is locked, never read-modified-written by the
//! caller.

use crate::{Order, OrderError, OrderRef, OrderResult, Transition, TransitionOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

/// Persistent order storage
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order. Fails with [`OrderError::Duplicate`] if the reference exists.
    async fn insert(&self, order: Order) -> OrderResult<()>;

    /// Order by reference
    async fn get(&self, reference: &OrderRef) -> OrderResult<Option<Order>>;

    /// Order bound to a provider-side id
    async fn find_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> OrderResult<Option<Order>>;

    /// Apply a transition if the current status allows it
    async fn transition(
        &self,
        reference: &OrderRef,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> OrderResult<TransitionOutcome>;

    /// References of `pending` orders whose expiry has passed
    async fn lapsed(&self, now: DateTime<Utc>) -> OrderResult<Vec<OrderRef>>;

    /// Get store type name
    fn store_type(&self) -> &'static str;
}

/// In-memory order store
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: DashMap<OrderRef, Order>,
    // (provider, external_id) -> reference
    external_ids: DashMap<(String, String), OrderRef>,
}

impl MemoryOrderStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Claim an external id for an order. Returns the other owner on clash.
    fn index_external_id(&self, order: &Order, external_id: &str) -> Option<OrderRef> {
        let key = (order.provider.clone(), external_id.to_string());
        match self.external_ids.entry(key) {
            Entry::Occupied(existing) if existing.get() != &order.reference => {
                Some(existing.get().clone())
            }
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(order.reference.clone());
                None
            }
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> OrderResult<()> {
        if let Some(external_id) = order.external_id.clone() {
            if let Some(owner) = self.index_external_id(&order, &external_id) {
                return Err(OrderError::Invalid(format!(
                    "external id {} already bound to {}",
                    external_id, owner
                )));
            }
        }

        match self.orders.entry(order.reference.clone()) {
            Entry::Occupied(_) => Err(OrderError::Duplicate(order.reference.to_string())),
            Entry::Vacant(slot) => {
                debug!(order_ref = %order.reference, provider = %order.provider, "Stored order");
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, reference: &OrderRef) -> OrderResult<Option<Order>> {
        Ok(self.orders.get(reference).map(|order| order.value().clone()))
    }

    async fn find_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> OrderResult<Option<Order>> {
        let key = (provider.to_ascii_lowercase(), external_id.to_string());
        let Some(reference) = self.external_ids.get(&key).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        self.get(&reference).await
    }

    async fn transition(
        &self,
        reference: &OrderRef,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> OrderResult<TransitionOutcome> {
        // Lock order: orders shard first, then the external id index
        let mut order = self
            .orders
            .get_mut(reference)
            .ok_or_else(|| OrderError::NotFound(reference.to_string()))?;

        let mut reserved = None;
        if order.external_id.is_none() {
            if let Some(external_id) = &transition.external_id {
                if let Some(owner) = self.index_external_id(&order, external_id) {
                    warn!(
                        order_ref = %reference,
                        external_id = %external_id,
                        owner = %owner,
                        "External id already bound to another order"
                    );
                    return Ok(TransitionOutcome::IntegrityConflict {
                        bound: owner.to_string(),
                        offered: external_id.clone(),
                    });
                }
                reserved = Some((order.provider.clone(), external_id.clone()));
            }
        }

        let outcome = transition.apply(&mut order, now);

        // Release the reservation if the transition did not bind it
        if let Some(key) = reserved {
            if order.external_id.as_ref() != Some(&key.1) {
                self.external_ids.remove_if(&key, |_, owner| owner == reference);
            }
        }

        debug!(
            order_ref = %reference,
            target = %transition.target,
            applied = outcome.is_applied(),
            "Order transition evaluated"
        );
        Ok(outcome)
    }

    async fn lapsed(&self, now: DateTime<Utc>) -> OrderResult<Vec<OrderRef>> {
        let mut refs: Vec<OrderRef> = self
            .orders
            .iter()
            .filter(|entry| entry.is_lapsed(now))
            .map(|entry| entry.key().clone())
            .collect();
        refs.sort();
        Ok(refs)
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
