//! Webhook handlers that drive the order state machine
//!
//! Each canonical event type maps to one order [`Transition`]. The order is
//! located by our reference when the provider echoes it back, otherwise by
//! the provider-side id bound when the session was opened.

use crate::notify::{Notification, NotificationKind, NotificationSink, Severity};
use async_trait::async_trait;
use paylane_orders::{Order, OrderRef, OrderStore, Transition, TransitionOutcome};
use paylane_webhooks::{
    HandlerOutcome, InboundEvent, WebhookError, WebhookEventType, WebhookHandler, WebhookRouter,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// `data` fields that may carry our order reference
const ORDER_REF_FIELDS: &[&str] = &["order_ref", "orderRef", "reference", "merchant_reference"];

/// `data` fields that may carry the provider-side id
const EXTERNAL_ID_FIELDS: &[&str] = &["external_id", "transaction_id", "session_id", "id"];

/// `data` fields that may carry a failure reason
const REASON_FIELDS: &[&str] = &["reason", "failure_reason", "decline_reason", "message"];

/// Applies provider events to orders
pub struct OrderTransitionHandler {
    orders: Arc<dyn OrderStore>,
    sink: Arc<dyn NotificationSink>,
}

impl OrderTransitionHandler {
    /// Create a handler over an order store
    pub fn new(orders: Arc<dyn OrderStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { orders, sink }
    }

    /// Transition requested by an event, `None` for types that move nothing
    fn transition_for(event: &InboundEvent) -> Option<Transition> {
        let transition = match &event.kind {
            WebhookEventType::TransactionCompleted => Transition::completed(),
            WebhookEventType::TransactionFailed => Transition::failed(
                first_field(event, REASON_FIELDS).unwrap_or("declined by provider"),
            ),
            WebhookEventType::TransactionExpired => Transition::expired(),
            WebhookEventType::TransactionCancelled => Transition::cancelled(
                first_field(event, REASON_FIELDS).map(|reason| reason.to_string()),
            ),
            WebhookEventType::Unknown(_) => return None,
        };

        let transition = match first_field(event, EXTERNAL_ID_FIELDS) {
            Some(external_id) => transition.external_id(external_id),
            None => transition,
        };

        let transition = transition
            .metadata("last_event_id", event.event_id())
            .metadata("last_event_type", event.envelope.event_type.as_str());

        Some(match serde_json::to_string(&event.envelope) {
            Ok(raw) => transition.payload(raw),
            Err(_) => transition,
        })
    }

    /// The order an event refers to. The inner error describes why no
    /// stored order can match.
    async fn locate(
        &self,
        event: &InboundEvent,
    ) -> Result<Result<Order, String>, WebhookError> {
        if let Some(raw) = first_field(event, ORDER_REF_FIELDS) {
            let reference = match OrderRef::parse(raw) {
                Ok(reference) => reference,
                Err(e) => return Ok(Err(e.to_string())),
            };
            let order = self
                .orders
                .get(&reference)
                .await
                .map_err(|e| WebhookError::handler(e.to_string()))?;
            return Ok(order.ok_or_else(|| format!("order {} does not exist", reference)));
        }

        if let Some(external_id) = first_field(event, EXTERNAL_ID_FIELDS) {
            let order = self
                .orders
                .find_by_external_id(&event.provider, external_id)
                .await
                .map_err(|e| WebhookError::handler(e.to_string()))?;
            return Ok(order.ok_or_else(|| {
                format!("no order bound to {} id {}", event.provider, external_id)
            }));
        }

        Ok(Err("event references no known order".to_string()))
    }

    fn conflict(&self, event: &InboundEvent, detail: String) -> HandlerOutcome {
        error!(
            provider = %event.provider,
            event_id = %event.event_id(),
            detail = %detail,
            "Webhook conflicts with stored order"
        );
        self.sink.emit(
            Notification::new(
                NotificationKind::IntegrityConflict,
                Severity::Critical,
                "Webhook event conflicts with stored order",
            )
            .with_metadata(serde_json::json!({
                "provider": event.provider,
                "event_id": event.event_id(),
                "event_type": event.kind.as_str(),
                "detail": detail,
            })),
        );
        HandlerOutcome::Conflict(detail)
    }
}

#[async_trait]
impl WebhookHandler for OrderTransitionHandler {
    async fn handle(&self, event: &InboundEvent) -> paylane_webhooks::Result<HandlerOutcome> {
        let Some(transition) = Self::transition_for(event) else {
            return Ok(HandlerOutcome::Ignored);
        };

        let order = match self.locate(event).await? {
            Ok(order) => order,
            Err(detail) => return Ok(self.conflict(event, detail)),
        };

        if order.provider != event.provider {
            return Ok(self.conflict(
                event,
                format!(
                    "order {} belongs to {}, not {}",
                    order.reference, order.provider, event.provider
                ),
            ));
        }

        let outcome = self
            .orders
            .transition(&order.reference, &transition, event.received_at)
            .await
            .map_err(|e| WebhookError::handler(e.to_string()))?;

        match outcome {
            TransitionOutcome::Applied { from, order } => {
                info!(
                    order_ref = %order.reference,
                    provider = %order.provider,
                    from = %from,
                    to = %order.status,
                    event_id = %event.event_id(),
                    "Order transitioned"
                );
                Ok(HandlerOutcome::Applied)
            }
            TransitionOutcome::AlreadyInState(order) => {
                debug!(
                    order_ref = %order.reference,
                    status = %order.status,
                    "Order already in target state"
                );
                Ok(HandlerOutcome::Unchanged)
            }
            TransitionOutcome::Rejected {
                current,
                target,
                reason,
            } => {
                // Late or out-of-order deliveries land here
                warn!(
                    order_ref = %order.reference,
                    current = %current,
                    target = %target,
                    reason = %reason,
                    "Ignoring transition not allowed from current status"
                );
                Ok(HandlerOutcome::Ignored)
            }
            TransitionOutcome::IntegrityConflict { bound, offered } => Ok(self.conflict(
                event,
                format!(
                    "order {} is bound to {}, event carries {}",
                    order.reference, bound, offered
                ),
            )),
        }
    }
}

/// Router with the order handler registered for every transition event
pub fn order_router(orders: Arc<dyn OrderStore>, sink: Arc<dyn NotificationSink>) -> WebhookRouter {
    let handler: Arc<dyn WebhookHandler> = Arc::new(OrderTransitionHandler::new(orders, sink));
    WebhookRouter::new()
        .on(WebhookEventType::TransactionCompleted, handler.clone())
        .on(WebhookEventType::TransactionFailed, handler.clone())
        .on(WebhookEventType::TransactionExpired, handler.clone())
        .on(WebhookEventType::TransactionCancelled, handler)
}

fn first_field<'a>(event: &'a InboundEvent, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| event.envelope.data_str(field))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemorySink;
    use chrono::{Duration, Utc};
    use paylane_orders::{Amount, MemoryOrderStore, OrderStatus, FAILURE_REASON_KEY};
    use paylane_providers::{Capability, Decimal};
    use paylane_webhooks::WebhookEnvelope;

    async fn setup() -> (Arc<MemoryOrderStore>, Arc<MemorySink>, OrderRef) {
        let orders = Arc::new(MemoryOrderStore::new());
        let now = Utc::now();
        let order = Order::new(
            Capability::Payout,
            "nium",
            Amount::new(Decimal::from(40), "GBP"),
            Duration::minutes(30),
            now,
        );
        let reference = order.reference.clone();
        orders.insert(order).await.unwrap();
        orders
            .transition(&reference, &Transition::accepted("nium_tx_1"), now)
            .await
            .unwrap();
        (orders, Arc::new(MemorySink::new()), reference)
    }

    fn event(provider: &str, event_type: &str, data: serde_json::Value) -> InboundEvent {
        InboundEvent::new(
            provider,
            WebhookEnvelope {
                id: "evt_1".into(),
                event_type: event_type.into(),
                data,
            },
        )
    }

    #[tokio::test]
    async fn test_failed_event_records_reason() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink);

        let outcome = handler
            .handle(&event(
                "nium",
                "payment.declined",
                serde_json::json!({ "order_ref": reference.as_str(), "reason": "limit exceeded" }),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Applied);
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.metadata_str(FAILURE_REASON_KEY), Some("limit exceeded"));
        assert_eq!(order.metadata_str("last_event_id"), Some("evt_1"));
        assert!(order.last_payload.is_some());
    }

    #[tokio::test]
    async fn test_lookup_by_external_id() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink);

        let outcome = handler
            .handle(&event(
                "nium",
                "transaction.completed",
                serde_json::json!({ "transaction_id": "nium_tx_1" }),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Applied);
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_order_is_a_conflict() {
        let (orders, sink, _) = setup().await;
        let handler = OrderTransitionHandler::new(orders, sink.clone());

        let outcome = handler
            .handle(&event(
                "nium",
                "transaction.completed",
                serde_json::json!({ "transaction_id": "nobody" }),
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, HandlerOutcome::Conflict(_)));
        assert_eq!(sink.of_kind(NotificationKind::IntegrityConflict).len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_order_ref_is_a_conflict() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink.clone());
        let long_ref = "ORD-".repeat(40);

        for raw in ["ORD with space", long_ref.as_str()] {
            let outcome = handler
                .handle(&event(
                    "nium",
                    "transaction.completed",
                    serde_json::json!({ "order_ref": raw }),
                ))
                .await
                .unwrap();
            assert!(matches!(outcome, HandlerOutcome::Conflict(_)));
        }

        assert_eq!(sink.of_kind(NotificationKind::IntegrityConflict).len(), 2);
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_transition_evaluated_at_delivery_time() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink);
        let completed = event(
            "nium",
            "transaction.completed",
            serde_json::json!({ "order_ref": reference.as_str() }),
        );

        let outcome = handler
            .handle(&completed.at(Utc::now() + Duration::minutes(90)))
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Ignored);
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_mismatched_external_id_not_applied() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink.clone());

        let outcome = handler
            .handle(&event(
                "nium",
                "transaction.completed",
                serde_json::json!({ "order_ref": reference.as_str(), "external_id": "nium_tx_2" }),
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, HandlerOutcome::Conflict(_)));
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.external_id.as_deref(), Some("nium_tx_1"));
    }

    #[tokio::test]
    async fn test_other_providers_order_is_a_conflict() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink);

        let outcome = handler
            .handle(&event(
                "openpayd",
                "transaction.completed",
                serde_json::json!({ "order_ref": reference.as_str() }),
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, HandlerOutcome::Conflict(_)));
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_late_event_ignored() {
        let (orders, sink, reference) = setup().await;
        let handler = OrderTransitionHandler::new(orders.clone(), sink);
        let data = serde_json::json!({ "order_ref": reference.as_str() });

        handler
            .handle(&event("nium", "transaction.completed", data.clone()))
            .await
            .unwrap();
        let outcome = handler
            .handle(&event("nium", "transaction.expired", data))
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Ignored);
        let order = orders.get(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }
}
