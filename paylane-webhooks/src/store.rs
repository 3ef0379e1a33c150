//! Webhook event storage
//!
//! The store is the authority on deduplication: `insert` must enforce
//! uniqueness of `(provider, event_id)` itself, so concurrent duplicate
//! deliveries cannot both create a record.

use crate::{Result, WebhookError, WebhookEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

/// Result of an insert attempt
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The record was created
    Inserted,
    /// A record with the same identity already exists
    Exists(WebhookEvent),
}

/// Persistent storage for webhook event records
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Create a record unless `(provider, event_id)` already exists
    async fn insert(&self, event: WebhookEvent) -> Result<InsertOutcome>;

    /// Look up a record
    async fn get(&self, provider: &str, event_id: &str) -> Result<Option<WebhookEvent>>;

    /// Take over an unprocessed record for another handler attempt.
    ///
    /// Succeeds only if the record is still retryable at `now`; on success
    /// the error is cleared, the attempt counter bumped and the attempt time
    /// set, so a concurrent claim of the same record fails.
    async fn claim(
        &self,
        provider: &str,
        event_id: &str,
        now: DateTime<Utc>,
        stuck_after: chrono::Duration,
    ) -> Result<bool>;

    /// Terminal success write. Returns `false` if the record was already processed.
    async fn mark_processed(&self, provider: &str, event_id: &str, at: DateTime<Utc>)
    -> Result<bool>;

    /// Record a handler failure on an unprocessed record
    async fn mark_failed(&self, provider: &str, event_id: &str, error: &str) -> Result<()>;

    /// Every record not yet processed, oldest first
    async fn unprocessed(&self) -> Result<Vec<WebhookEvent>>;

    /// Get the store type name
    fn store_type(&self) -> &'static str;
}

/// In-memory event store backed by DashMap
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: DashMap<(String, String), WebhookEvent>,
}

impl MemoryEventStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn key(provider: &str, event_id: &str) -> (String, String) {
        (provider.to_string(), event_id.to_string())
    }
}

#[async_trait]
impl WebhookEventStore for MemoryEventStore {
    async fn insert(&self, event: WebhookEvent) -> Result<InsertOutcome> {
        match self
            .events
            .entry(Self::key(&event.provider, &event.event_id))
        {
            Entry::Occupied(existing) => Ok(InsertOutcome::Exists(existing.get().clone())),
            Entry::Vacant(slot) => {
                debug!(provider = %event.provider, event_id = %event.event_id, "Stored webhook event");
                slot.insert(event);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn get(&self, provider: &str, event_id: &str) -> Result<Option<WebhookEvent>> {
        Ok(self
            .events
            .get(&Self::key(provider, event_id))
            .map(|e| e.clone()))
    }

    async fn claim(
        &self,
        provider: &str,
        event_id: &str,
        now: DateTime<Utc>,
        stuck_after: chrono::Duration,
    ) -> Result<bool> {
        let Some(mut event) = self.events.get_mut(&Self::key(provider, event_id)) else {
            return Ok(false);
        };

        if !event.is_retryable(now, stuck_after) {
            return Ok(false);
        }

        event.error = None;
        event.attempts = event.attempts.saturating_add(1);
        event.last_attempt_at = now;
        Ok(true)
    }

    async fn mark_processed(
        &self,
        provider: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut event = self
            .events
            .get_mut(&Self::key(provider, event_id))
            .ok_or_else(|| WebhookError::store(format!("no event {}/{}", provider, event_id)))?;

        if event.processed {
            return Ok(false);
        }

        event.processed = true;
        event.processed_at = Some(at);
        event.error = None;
        Ok(true)
    }

    async fn mark_failed(&self, provider: &str, event_id: &str, error: &str) -> Result<()> {
        let mut event = self
            .events
            .get_mut(&Self::key(provider, event_id))
            .ok_or_else(|| WebhookError::store(format!("no event {}/{}", provider, event_id)))?;

        if !event.processed {
            event.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn unprocessed(&self) -> Result<Vec<WebhookEvent>> {
        let mut events: Vec<WebhookEvent> = self
            .events
            .iter()
            .filter(|e| !e.processed)
            .map(|e| e.clone())
            .collect();
        events.sort_by_key(|e| e.received_at);
        Ok(events)
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebhookEnvelope;
    use std::sync::Arc;

    fn event(id: &str, now: DateTime<Utc>) -> WebhookEvent {
        let envelope = WebhookEnvelope {
            id: id.to_string(),
            event_type: "transaction.completed".to_string(),
            data: serde_json::Value::Null,
        };
        WebhookEvent::new("nium", &envelope, "sig", b"{}", now)
    }

    #[tokio::test]
    async fn test_insert_is_unique() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        assert_eq!(store.insert(event("E1", now)).await.unwrap(), InsertOutcome::Inserted);
        assert!(matches!(
            store.insert(event("E1", now)).await.unwrap(),
            InsertOutcome::Exists(_)
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_event_id_different_providers() {
        let store = MemoryEventStore::new();
        let now = Utc::now();
        let mut other = event("E1", now);
        other.provider = "openpayd".to_string();

        store.insert(event("E1", now)).await.unwrap();
        assert_eq!(store.insert(other).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_create_one_record() {
        let store = Arc::new(MemoryEventStore::new());
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(event("E1", now)).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_processed_is_terminal() {
        let store = MemoryEventStore::new();
        let now = Utc::now();
        store.insert(event("E1", now)).await.unwrap();

        assert!(store.mark_processed("nium", "E1", now).await.unwrap());
        assert!(!store.mark_processed("nium", "E1", now).await.unwrap());

        store.mark_failed("nium", "E1", "late failure").await.unwrap();
        let record = store.get("nium", "E1").await.unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.processed_at, Some(now));
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn test_claim_failed_record_once() {
        let store = MemoryEventStore::new();
        let now = Utc::now();
        let stuck_after = chrono::Duration::minutes(10);
        store.insert(event("E1", now)).await.unwrap();

        // In flight, not claimable yet
        assert!(!store.claim("nium", "E1", now, stuck_after).await.unwrap());

        store.mark_failed("nium", "E1", "db timeout").await.unwrap();
        assert!(store.claim("nium", "E1", now, stuck_after).await.unwrap());
        assert!(!store.claim("nium", "E1", now, stuck_after).await.unwrap());

        let record = store.get("nium", "E1").await.unwrap().unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn test_unprocessed_oldest_first() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        store.insert(event("E2", now)).await.unwrap();
        store
            .insert(event("E1", now - chrono::Duration::seconds(30)))
            .await
            .unwrap();
        store.insert(event("E3", now)).await.unwrap();
        store.mark_processed("nium", "E3", now).await.unwrap();

        let pending: Vec<String> = store
            .unprocessed()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        assert_eq!(pending, vec!["E1", "E2"]);
    }

    #[tokio::test]
    async fn test_mark_missing_record() {
        let store = MemoryEventStore::new();
        assert!(store.mark_processed("nium", "nope", Utc::now()).await.is_err());
        assert!(!store
            .claim("nium", "nope", Utc::now(), chrono::Duration::zero())
            .await
            .unwrap());
    }
}
