//! The gateway facade: one explicitly constructed instance per process,
//! handed to the cache mirror, the orchestrator and tests.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use servetrack_core::{
    defaults, BlobStore, ChangeKind, Collection, DocumentStore, Error, EventBus, FunctionRunner,
    Query, Result, Subscription,
};

use crate::config::GatewayConfig;
use crate::notify::{NotificationTicket, Notifier};
use crate::rest::RestBackend;

/// Valid storage file references: alphanumeric or underscore, at most 36
/// characters, not starting with an underscore.
pub const FILE_REF_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_]{0,35}$";

/// Result of a mutation together with its queued notification, if any.
///
/// The notification outcome is observed separately and never changes the
/// mutation result.
#[derive(Debug)]
pub struct Mutation<T> {
    pub record: T,
    pub notification: Option<NotificationTicket>,
}

impl<T> Mutation<T> {
    pub fn new(record: T) -> Self {
        Self {
            record,
            notification: None,
        }
    }

    pub fn with_notification(record: T, ticket: NotificationTicket) -> Self {
        Self {
            record,
            notification: Some(ticket),
        }
    }

    pub fn into_record(self) -> T {
        self.record
    }
}

/// Facade over the remote document store, storage bucket and function
/// endpoint.
pub struct Gateway {
    pub(crate) config: GatewayConfig,
    pub(crate) documents: Arc<dyn DocumentStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) notifier: Notifier,
    pub(crate) events: Arc<EventBus>,
    file_ref_pattern: Regex,
}

impl Gateway {
    /// Build a gateway over any backend that implements all three seams.
    pub fn new<B>(config: GatewayConfig, backend: Arc<B>) -> Result<Self>
    where
        B: DocumentStore + BlobStore + FunctionRunner + 'static,
    {
        let file_ref_pattern = Regex::new(FILE_REF_PATTERN)
            .map_err(|e| Error::Config(format!("Invalid file reference pattern: {}", e)))?;
        let notifier = Notifier::new(
            backend.clone(),
            config.email_function.clone(),
            config.business_email.clone(),
        );

        Ok(Self {
            config,
            documents: backend.clone(),
            blobs: backend,
            notifier,
            events: Arc::new(EventBus::default()),
            file_ref_pattern,
        })
    }

    /// Build a gateway over the REST backend.
    pub fn connect(config: GatewayConfig) -> Result<Self> {
        let backend = Arc::new(RestBackend::new(config.clone())?);
        Self::new(config, backend)
    }

    /// Share an existing bus, e.g. one also fed by a real-time transport.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Subscribe to the change feed. An empty slice means every collection.
    pub fn subscribe(&self, collections: &[Collection]) -> Subscription {
        self.events.subscribe(collections)
    }

    pub fn is_valid_file_ref(&self, file_ref: &str) -> bool {
        self.file_ref_pattern.is_match(file_ref)
    }

    pub(crate) fn collection_id(&self, collection: Collection) -> &str {
        self.config.collections.id_for(collection)
    }

    pub(crate) fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub(crate) fn emit(&self, collection: Collection, kind: ChangeKind, id: &str) {
        self.events.emit(collection, kind, id);
    }

    /// Fetch every matching raw document.
    ///
    /// When the caller sets no limit the listing is paged in
    /// [`defaults::INTERNAL_FETCH_LIMIT`] chunks until a short page comes back.
    /// A caller-supplied limit is a single request.
    pub(crate) async fn fetch_all(
        &self,
        collection: Collection,
        queries: Vec<Query>,
    ) -> Result<Vec<JsonValue>> {
        let collection_id = self.collection_id(collection);
        if queries.iter().any(|q| matches!(q, Query::Limit(_))) {
            let list = self
                .documents
                .list_documents(collection_id, &queries)
                .await?;
            debug!(
                collection = collection.as_str(),
                total = list.total,
                returned = list.documents.len(),
                "gateway: fetched documents"
            );
            return Ok(list.documents);
        }

        let page_size = defaults::INTERNAL_FETCH_LIMIT;
        let mut documents = Vec::new();
        let mut offset: u32 = 0;
        loop {
            let mut page_queries = queries.clone();
            page_queries.push(Query::limit(page_size));
            if offset > 0 {
                page_queries.push(Query::offset(offset));
            }
            let page = self
                .documents
                .list_documents(collection_id, &page_queries)
                .await?;
            let returned = page.documents.len();
            documents.extend(page.documents);
            if returned < page_size as usize {
                break;
            }
            offset = offset.saturating_add(page_size);
        }
        debug!(
            collection = collection.as_str(),
            returned = documents.len(),
            "gateway: fetched documents"
        );
        Ok(documents)
    }

    /// Ids of every document in `collection` owned by `client_id`.
    pub(crate) async fn owned_ids(
        &self,
        collection: Collection,
        client_id: &str,
    ) -> Result<Vec<String>> {
        let docs = self
            .fetch_all(collection, vec![Query::equal("client_id", client_id)])
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get("$id").or_else(|| d.get("id")))
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect())
    }

    /// Check whether anything references `candidate` as its owning client.
    ///
    /// Searches cases, then documents, then serve attempts, and returns the
    /// id on the first hit. `None` means unresolvable, which is a normal
    /// outcome. Lookup errors are logged and the search moves on.
    pub async fn resolve_client_id(&self, candidate: &str) -> Option<String> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }

        for collection in [
            Collection::Cases,
            Collection::Documents,
            Collection::ServeAttempts,
        ] {
            let queries = [Query::equal("client_id", candidate), Query::limit(1)];
            match self
                .documents
                .list_documents(self.collection_id(collection), &queries)
                .await
            {
                Ok(list) if !list.documents.is_empty() => {
                    debug!(
                        client_id = candidate,
                        collection = collection.as_str(),
                        "gateway: client id resolved"
                    );
                    return Some(candidate.to_string());
                }
                Ok(_) => {}
                Err(e) => warn!(
                    client_id = candidate,
                    collection = collection.as_str(),
                    error = %e,
                    "gateway: client id lookup failed, trying next collection"
                ),
            }
        }

        info!(client_id = candidate, "gateway: client id unresolvable");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn gateway() -> Gateway {
        Gateway::new(GatewayConfig::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_file_ref_validation() {
        let gw = gateway();
        assert!(gw.is_valid_file_ref("abc123"));
        assert!(gw.is_valid_file_ref("a_b_c"));
        assert!(gw.is_valid_file_ref(&Gateway::new_id()));
        assert!(!gw.is_valid_file_ref("_leading"));
        assert!(!gw.is_valid_file_ref(""));
        assert!(!gw.is_valid_file_ref("has-dash"));
        assert!(!gw.is_valid_file_ref(&"a".repeat(37)));
        assert!(gw.is_valid_file_ref(&"a".repeat(36)));
    }

    #[test]
    fn test_mutation_helpers() {
        let m = Mutation::new(5);
        assert!(m.notification.is_none());
        assert_eq!(m.into_record(), 5);
    }

    #[tokio::test]
    async fn test_resolve_blank_is_none() {
        assert!(gateway().resolve_client_id("  ").await.is_none());
    }
}
