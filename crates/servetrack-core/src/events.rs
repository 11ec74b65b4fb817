//! Change feed: event types and the broadcast bus that carries them.
//!
//! Every successful gateway mutation publishes a [`ChangeEvent`]. Remote
//! real-time transports feed the same bus through [`EventBus::publish`], so
//! consumers (cache mirror, orchestrator) see one ordered stream regardless of
//! where a change originated.
//!
//! Consumers hold a [`Subscription`] filtered to the collections they care
//! about. A subscriber that falls behind receives [`FeedEvent::Resync`] instead
//! of the missed events and is expected to refetch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Logical collections of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Clients,
    ServeAttempts,
    Cases,
    Documents,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Clients,
        Collection::ServeAttempts,
        Collection::Cases,
        Collection::Documents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::ServeAttempts => "serve_attempts",
            Self::Cases => "cases",
            Self::Documents => "documents",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// One change to one document.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// UUIDv7, so events sort by emission time.
    pub event_id: Uuid,
    /// Namespaced type, e.g. `"serve_attempts.updated"`.
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub collection: Collection,
    pub document_id: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(collection: Collection, kind: ChangeKind, document_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: format!("{}.{}", collection.as_str(), kind.as_str()),
            occurred_at: Utc::now(),
            collection,
            document_id: document_id.into(),
            kind,
        }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Change(ChangeEvent),
    /// The subscriber fell behind and `missed` events were dropped.
    Resync { missed: u64 },
}

/// Broadcast-based bus for change events.
///
/// Uses `tokio::sync::broadcast`. Publishing with no subscribers is a no-op.
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            document_id = %event.document_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus publish"
        );
        let _ = self.tx.send(event);
    }

    pub fn emit(&self, collection: Collection, kind: ChangeKind, document_id: impl Into<String>) {
        self.publish(ChangeEvent::new(collection, kind, document_id));
    }

    /// Subscribe to changes in the given collections. An empty slice means all.
    pub fn subscribe(&self, collections: &[Collection]) -> Subscription {
        let filter = if collections.is_empty() {
            Collection::ALL.to_vec()
        } else {
            collections.to_vec()
        };
        Subscription {
            rx: Some(self.tx.subscribe()),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

/// A filtered view of the bus. Dropping it also unsubscribes.
pub struct Subscription {
    rx: Option<broadcast::Receiver<ChangeEvent>>,
    filter: Vec<Collection>,
}

impl Subscription {
    /// Next event for the subscribed collections, or `None` once unsubscribed
    /// or the bus is gone.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) if self.filter.contains(&event.collection) => {
                    return Some(FeedEvent::Change(event))
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Change feed subscriber lagged");
                    return Some(FeedEvent::Resync { missed });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Stop receiving. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            tracing::debug!(collections = ?self.filter, "Change feed unsubscribed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    pub fn collections(&self) -> &[Collection] {
        &self.filter
    }
}
