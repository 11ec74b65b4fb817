//! Local mirror of the most recent remote data.
//!
//! The mirror is a best-effort copy: the remote store stays authoritative.
//! Sync methods report success as a `bool` and log failures; a failed sync
//! leaves the previously persisted content in place.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use servetrack_core::{
    normalize_serve_attempts, parse_all, parse_client, Client, Collection, FeedEvent, Result,
    ServeAttempt, Subscription,
};
use servetrack_gateway::Gateway;

use crate::config::CacheConfig;
use crate::store::LocalStore;

/// Key holding the client collection.
pub const CLIENTS_KEY: &str = "clients";
/// Key holding the bounded serve attempt window.
pub const SERVES_KEY: &str = "serveAttempts";

/// Zero-payload signal sent after every successful serve sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServesUpdated;

/// Bound the memory a sync batch may take.
///
/// Records past `image_window` lose their image. If the batch still
/// serializes to more than `max_bytes`, every image is dropped. Returns
/// whether the size cap was hit.
pub fn apply_memory_bounds(
    records: &mut [ServeAttempt],
    image_window: usize,
    max_bytes: usize,
) -> Result<bool> {
    for record in records.iter_mut().skip(image_window) {
        record.strip_image();
    }

    let size = serde_json::to_vec(records)?.len();
    if size <= max_bytes {
        return Ok(false);
    }

    warn!(
        size,
        max_bytes,
        records = records.len(),
        "cache: sync batch over size cap, dropping all images"
    );
    for record in records.iter_mut() {
        record.strip_image();
    }
    Ok(true)
}

pub struct CacheMirror {
    gateway: Arc<Gateway>,
    store: Arc<dyn LocalStore>,
    config: CacheConfig,
    updates: broadcast::Sender<ServesUpdated>,
}

impl CacheMirror {
    pub fn new(gateway: Arc<Gateway>, store: Arc<dyn LocalStore>, config: CacheConfig) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            gateway,
            store,
            config,
            updates,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Receiver for [`ServesUpdated`] signals.
    pub fn watch_updates(&self) -> broadcast::Receiver<ServesUpdated> {
        self.updates.subscribe()
    }

    /// Mirror the newest window of serve attempts, replacing what was stored.
    pub async fn sync_serves(&self) -> bool {
        let mut records = match self
            .gateway
            .try_list_serve_attempts(self.config.window, 0)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "cache: serve sync failed, keeping previous mirror");
                return false;
            }
        };

        let stripped = match apply_memory_bounds(
            &mut records,
            self.config.image_window,
            self.config.max_bytes,
        ) {
            Ok(stripped) => stripped,
            Err(e) => {
                warn!(error = %e, "cache: serve batch could not be measured");
                return false;
            }
        };

        if let Err(e) = self.persist(SERVES_KEY, &records).await {
            warn!(error = %e, "cache: serve mirror write failed");
            return false;
        }

        let listeners = self.updates.send(ServesUpdated).unwrap_or(0);
        info!(
            records = records.len(),
            images_dropped = stripped,
            listeners,
            "cache: serve attempts mirrored"
        );
        true
    }

    /// Mirror the full client collection.
    pub async fn sync_clients(&self) -> bool {
        let clients = match self.gateway.try_list_clients().await {
            Ok(clients) => clients,
            Err(e) => {
                warn!(error = %e, "cache: client sync failed, keeping previous mirror");
                return false;
            }
        };
        if let Err(e) = self.persist(CLIENTS_KEY, &clients).await {
            warn!(error = %e, "cache: client mirror write failed");
            return false;
        }
        info!(records = clients.len(), "cache: clients mirrored");
        true
    }

    /// Both syncs; true only if both succeed.
    pub async fn sync_all(&self) -> bool {
        let clients = self.sync_clients().await;
        let serves = self.sync_serves().await;
        clients && serves
    }

    async fn persist<T: serde::Serialize>(&self, key: &str, records: &[T]) -> Result<()> {
        let body = serde_json::to_string(records)?;
        self.store.set(key, &body).await
    }

    async fn load(&self, key: &str) -> Vec<JsonValue> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "cache: read failed");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<JsonValue>>(&raw) {
            Ok(values) => values,
            Err(e) => {
                warn!(key, error = %e, "cache: stored value is not an array, ignoring");
                Vec::new()
            }
        }
    }

    /// Serve attempts from the last successful sync.
    pub async fn cached_serves(&self) -> Vec<ServeAttempt> {
        normalize_serve_attempts(&self.load(SERVES_KEY).await)
    }

    /// Clients from the last successful sync.
    pub async fn cached_clients(&self) -> Vec<Client> {
        parse_all(&self.load(CLIENTS_KEY).await, parse_client)
    }

    /// Resync after each burst of relevant changes until the subscription ends.
    ///
    /// Events are collected until the feed stays quiet for
    /// [`CacheConfig::resync_delay`], then each touched collection is synced
    /// once. A lagged feed resyncs both.
    pub async fn run_resync_loop(&self, mut subscription: Subscription) {
        while let Some(first) = subscription.recv().await {
            let mut pending = PendingResync::default();
            pending.note(&first);

            let mut closed = false;
            loop {
                match tokio::time::timeout(self.config.resync_delay, subscription.recv()).await {
                    Ok(Some(event)) => pending.note(&event),
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            debug!(
                events = pending.events,
                serves = pending.serves,
                clients = pending.clients,
                "cache: change burst settled"
            );
            if pending.serves {
                self.sync_serves().await;
            }
            if pending.clients {
                self.sync_clients().await;
            }
            if closed {
                break;
            }
        }
        debug!("cache: resync loop stopped");
    }

    /// Subscribe to the gateway's feed and run the resync loop on a task.
    pub fn spawn_resync(self: &Arc<Self>) -> JoinHandle<()> {
        let subscription = self
            .gateway
            .subscribe(&[Collection::ServeAttempts, Collection::Clients]);
        let mirror = Arc::clone(self);
        tokio::spawn(async move { mirror.run_resync_loop(subscription).await })
    }
}

#[derive(Debug, Default)]
struct PendingResync {
    events: usize,
    serves: bool,
    clients: bool,
}

impl PendingResync {
    fn note(&mut self, event: &FeedEvent) {
        self.events += 1;
        match event {
            FeedEvent::Change(change) => match change.collection {
                Collection::ServeAttempts => self.serves = true,
                Collection::Clients => self.clients = true,
                _ => {}
            },
            FeedEvent::Resync { missed } => {
                debug!(missed, "cache: feed lagged, full resync");
                self.serves = true;
                self.clients = true;
            }
        }
    }
}
