//! Client-side state and the mutations that keep it current.
//!
//! After a successful remote mutation the in-memory collections are patched
//! directly, then a debounced full refresh is scheduled to reconcile with the
//! remote store. A failed mutation leaves state untouched and hands the error
//! back for user-facing reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use servetrack_cache::CacheMirror;
use servetrack_core::{
    defaults, Case, CaseUpdate, Client, ClientUpdate, Collection, Document, Error, FeedEvent,
    NewCase, NewClient, NewDocument, NewServeAttempt, Result, ServeAttempt, ServeAttemptUpdate,
    Subscription,
};
use servetrack_gateway::{apply_image_window, CascadeReport, Gateway, Mutation};

/// In-memory entity collections.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub clients: Vec<Client>,
    /// Newest first.
    pub serve_attempts: Vec<ServeAttempt>,
    pub cases: Vec<Case>,
    pub documents: Vec<Document>,
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Clients and serve attempts came from the local mirror on the last
    /// refresh.
    pub from_cache: bool,
}

impl State {
    fn sort_clients(&mut self) {
        self.clients
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    fn sort_serves(&mut self) {
        self.serve_attempts
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    fn replace<T, F>(items: &mut [T], is_target: F, record: T)
    where
        F: Fn(&T) -> bool,
    {
        if let Some(slot) = items.iter_mut().find(|item| is_target(item)) {
            *slot = record;
        }
    }
}

/// Text for a dismissible notice after a failed primary operation.
pub fn user_notice(error: &Error) -> String {
    error.user_message()
}

struct Inner {
    gateway: Arc<Gateway>,
    cache: Option<Arc<CacheMirror>>,
    refresh_delay: Duration,
    state: RwLock<State>,
    pending_refresh: Mutex<Option<JoinHandle<()>>>,
}

/// Owns client-side state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<Gateway>,
        cache: Option<Arc<CacheMirror>>,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                cache,
                refresh_delay,
                state: RwLock::new(State::default()),
                pending_refresh: Mutex::new(None),
            }),
        }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.inner.gateway
    }

    pub async fn snapshot(&self) -> State {
        self.inner.state.read().await.clone()
    }

    pub async fn clients(&self) -> Vec<Client> {
        self.inner.state.read().await.clients.clone()
    }

    pub async fn serve_attempts(&self) -> Vec<ServeAttempt> {
        self.inner.state.read().await.serve_attempts.clone()
    }

    /// Reload every collection from the gateway.
    ///
    /// Clients and serve attempts fall back to the local mirror when the
    /// remote read fails; cases and documents keep their previous values.
    /// Returns whether everything came fresh from the remote store.
    pub async fn refresh(&self) -> bool {
        let gateway = &self.inner.gateway;
        let (clients, serves, cases, documents) = tokio::join!(
            gateway.try_list_clients(),
            gateway.try_list_serve_attempts(defaults::SERVE_PAGE_LIMIT, 0),
            gateway.try_list_cases(),
            gateway.try_list_documents(),
        );

        let mut fresh = true;
        let mut from_cache = false;

        let clients = match clients {
            Ok(clients) => Some(clients),
            Err(e) => {
                fresh = false;
                warn!(error = %e, "orchestrator: client refresh failed");
                match &self.inner.cache {
                    Some(cache) => {
                        from_cache = true;
                        Some(cache.cached_clients().await)
                    }
                    None => None,
                }
            }
        };
        let serves = match serves {
            Ok(serves) => Some(serves),
            Err(e) => {
                fresh = false;
                warn!(error = %e, "orchestrator: serve attempt refresh failed");
                match &self.inner.cache {
                    Some(cache) => {
                        from_cache = true;
                        Some(cache.cached_serves().await)
                    }
                    None => None,
                }
            }
        };
        let cases = cases
            .map_err(|e| warn!(error = %e, "orchestrator: case refresh failed"))
            .ok();
        let documents = documents
            .map_err(|e| warn!(error = %e, "orchestrator: document refresh failed"))
            .ok();
        fresh &= cases.is_some() && documents.is_some();

        let mut state = self.inner.state.write().await;
        if let Some(clients) = clients {
            state.clients = clients;
        }
        if let Some(serves) = serves {
            state.serve_attempts = serves;
        }
        if let Some(cases) = cases {
            state.cases = cases;
        }
        if let Some(documents) = documents {
            state.documents = documents;
        }
        state.from_cache = from_cache;
        state.last_refreshed = Some(Utc::now());

        info!(
            clients = state.clients.len(),
            serve_attempts = state.serve_attempts.len(),
            cases = state.cases.len(),
            documents = state.documents.len(),
            fresh,
            from_cache,
            "orchestrator: state refreshed"
        );
        fresh
    }

    /// Refresh after the configured delay. A newer call replaces a pending
    /// one, so bursts of mutations cause a single reload.
    pub fn schedule_refresh(&self) {
        let this = self.clone();
        let delay = self.inner.refresh_delay;
        let mut pending = match self.inner.pending_refresh.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.refresh().await;
        }));
        debug!(delay_ms = delay.as_millis() as u64, "orchestrator: refresh scheduled");
    }

    /// Treat every feed event as "something changed" and schedule a refresh.
    pub async fn run_change_loop(&self, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            match event {
                FeedEvent::Change(change) => {
                    debug!(event_type = %change.event_type, "orchestrator: change received")
                }
                FeedEvent::Resync { missed } => {
                    debug!(missed, "orchestrator: feed lagged")
                }
            }
            self.schedule_refresh();
        }
        debug!("orchestrator: change loop stopped");
    }

    /// Subscribe to every collection and run the change loop on a task.
    pub fn spawn_change_loop(&self) -> JoinHandle<()> {
        let subscription = self.inner.gateway.subscribe(&Collection::ALL);
        let this = self.clone();
        tokio::spawn(async move { this.run_change_loop(subscription).await })
    }

    // -------------------------------------------------------------------------
    // Clients
    // -------------------------------------------------------------------------

    pub async fn create_client(&self, req: NewClient) -> Result<Client> {
        let client = self.inner.gateway.create_client(req).await?;
        {
            let mut state = self.inner.state.write().await;
            state.clients.push(client.clone());
            state.sort_clients();
        }
        self.schedule_refresh();
        Ok(client)
    }

    pub async fn update_client(&self, id: &str, update: ClientUpdate) -> Result<Client> {
        let client = self.inner.gateway.update_client(id, update).await?;
        {
            let mut state = self.inner.state.write().await;
            State::replace(&mut state.clients, |c| c.id == id, client.clone());
            state.sort_clients();
        }
        self.schedule_refresh();
        Ok(client)
    }

    /// Delete a client and drop it and everything it owned from state.
    /// Records the cascade failed to delete stay, as do whole collections
    /// whose listing failed.
    pub async fn delete_client(&self, id: &str) -> Result<CascadeReport> {
        let report = self.inner.gateway.delete_client(id).await?;
        let unlisted: Vec<Collection> = report
            .failures
            .iter()
            .filter(|f| f.document_id.is_none())
            .map(|f| f.collection)
            .collect();
        let survivors: Vec<(Collection, &str)> = report
            .failures
            .iter()
            .filter_map(|f| f.document_id.as_deref().map(|d| (f.collection, d)))
            .collect();
        let kept = |collection: Collection, doc_id: &str| {
            unlisted.contains(&collection) || survivors.contains(&(collection, doc_id))
        };
        {
            let mut state = self.inner.state.write().await;
            state.clients.retain(|c| c.id != id);
            state
                .cases
                .retain(|c| c.client_id != id || kept(Collection::Cases, &c.id));
            state
                .serve_attempts
                .retain(|s| s.client_id != id || kept(Collection::ServeAttempts, &s.id));
            state
                .documents
                .retain(|d| d.client_id != id || kept(Collection::Documents, &d.id));
        }
        self.schedule_refresh();
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Serve attempts
    // -------------------------------------------------------------------------

    pub async fn create_serve_attempt(
        &self,
        req: NewServeAttempt,
    ) -> Result<Mutation<ServeAttempt>> {
        let mutation = self.inner.gateway.create_serve_attempt(req).await?;
        {
            let mut state = self.inner.state.write().await;
            state.serve_attempts.push(mutation.record.clone());
            state.sort_serves();
            apply_image_window(&mut state.serve_attempts, 0);
        }
        self.schedule_refresh();
        Ok(mutation)
    }

    pub async fn update_serve_attempt(
        &self,
        id: &str,
        update: ServeAttemptUpdate,
    ) -> Result<Mutation<ServeAttempt>> {
        let mutation = self.inner.gateway.update_serve_attempt(id, update).await?;
        {
            let mut state = self.inner.state.write().await;
            // Update responses are not windowed; keep stripped records stripped.
            let mut record = mutation.record.clone();
            if let Some(existing) = state.serve_attempts.iter().find(|s| s.id == id) {
                if !existing.has_image() {
                    record.strip_image();
                }
            }
            State::replace(&mut state.serve_attempts, |s| s.id == id, record);
        }
        self.schedule_refresh();
        Ok(mutation)
    }

    pub async fn delete_serve_attempt(&self, id: &str) -> Result<()> {
        self.inner.gateway.delete_serve_attempt(id).await?;
        self.inner
            .state
            .write()
            .await
            .serve_attempts
            .retain(|s| s.id != id);
        self.schedule_refresh();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Cases
    // -------------------------------------------------------------------------

    pub async fn create_case(&self, req: NewCase) -> Result<Case> {
        let case = self.inner.gateway.create_case(req).await?;
        self.inner.state.write().await.cases.insert(0, case.clone());
        self.schedule_refresh();
        Ok(case)
    }

    pub async fn update_case(&self, id: &str, update: CaseUpdate) -> Result<Case> {
        let case = self.inner.gateway.update_case(id, update).await?;
        {
            let mut state = self.inner.state.write().await;
            State::replace(&mut state.cases, |c| c.id == id, case.clone());
        }
        self.schedule_refresh();
        Ok(case)
    }

    pub async fn delete_case(&self, id: &str) -> Result<()> {
        self.inner.gateway.delete_case(id).await?;
        self.inner.state.write().await.cases.retain(|c| c.id != id);
        self.schedule_refresh();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    pub async fn upload_document(&self, req: NewDocument) -> Result<Document> {
        let document = self.inner.gateway.upload_document(req).await?;
        self.inner
            .state
            .write()
            .await
            .documents
            .insert(0, document.clone());
        self.schedule_refresh();
        Ok(document)
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.inner.gateway.delete_document(id).await?;
        self.inner
            .state
            .write()
            .await
            .documents
            .retain(|d| d.id != id);
        self.schedule_refresh();
        Ok(())
    }
}
