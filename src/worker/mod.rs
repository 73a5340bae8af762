//! The offline worker
//!
//! Sits between the foreground application and the network. It serves
//! intercepted requests through the fetch strategies, manages the worker
//! lifecycle, and bridges commands and events between itself and the open
//! clients.

pub mod classify;
pub mod clients;
pub mod lifecycle;
pub mod messages;
pub mod notifications;
pub mod strategy;
pub mod sync;
pub mod tasks;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStore;
use crate::client::{Fetcher, Request, Response};
use crate::config::{Bucket, Config};
use crate::error::{Error, NetworkError, Result};

use clients::{ClientId, ClientKind, Clients};
use lifecycle::{LifecycleState, Registration, precache_shell, purge_stale_caches};
use messages::{ClientCommand, PushSubscription, WorkerEvent};
use notifications::{ClickOutcome, NotificationIntent, click_target, dismissed_id};
use strategy::{Served, StrategyEngine};
use tasks::BackgroundTasks;

/// Result of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub assets_cached: usize,
    /// Install skips waiting, so this is set unless activation failed
    pub activation: Option<ActivationReport>,
}

/// Result of an activation
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub generation: String,
    pub deleted_caches: Vec<String>,
    pub claimed_clients: usize,
}

/// One background worker over a cache store and a network
pub struct OfflineWorker<F: Fetcher + 'static> {
    config: Arc<Config>,
    store: Arc<CacheStore>,
    fetcher: Arc<F>,
    clients: Arc<Clients>,
    tasks: Arc<BackgroundTasks>,
    engine: StrategyEngine<F>,
    registration: Mutex<Registration>,
    shown: Mutex<Vec<NotificationIntent>>,
}

impl<F: Fetcher + 'static> OfflineWorker<F> {
    /// Create a worker, picking up the persisted registration
    pub fn new(config: Config, store: CacheStore, fetcher: F) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(store);
        let fetcher = Arc::new(fetcher);
        let tasks = Arc::new(BackgroundTasks::new());
        let registration = Registration::load(&store)?;

        let engine = StrategyEngine::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&fetcher),
            Arc::clone(&tasks),
        );

        Ok(Self {
            config,
            store,
            fetcher,
            clients: Arc::new(Clients::new()),
            tasks,
            engine,
            registration: Mutex::new(registration),
            shown: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    fn registration_lock(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current registration
    pub fn registration(&self) -> Registration {
        self.registration_lock().clone()
    }

    /// Whether an active generation controls new clients
    pub fn is_active(&self) -> bool {
        self.registration_lock().active_generation.is_some()
    }

    /// Register a foreground window at `url`. It is controlled when a
    /// generation is active.
    pub fn connect_window(
        &self,
        url: &str,
    ) -> (ClientId, tokio::sync::mpsc::UnboundedReceiver<WorkerEvent>) {
        self.clients
            .register(url, ClientKind::Window, self.is_active())
    }

    /// Notifications displayed so far
    #[cfg(test)]
    pub fn shown_notifications(&self) -> Vec<NotificationIntent> {
        self.shown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wait for background work (refreshes) to settle
    pub async fn wait_idle(&self) {
        if !self.tasks.is_empty() {
            log::debug!("Waiting on {} background task(s)", self.tasks.len());
        }
        self.tasks.wait_idle().await;
    }

    fn broadcast(&self, event: WorkerEvent) -> usize {
        let delivered = self.clients.broadcast(&event);
        log::debug!("Broadcast {} to {} client(s)", event.kind(), delivered);
        delivered
    }

    // Fetch

    /// Serve an intercepted request
    pub async fn handle_fetch(&self, request: &Request) -> std::result::Result<Served, NetworkError> {
        let served = self.engine.handle(request).await?;
        log::debug!(
            "{} {} -> {} ({:?}, {})",
            request.method,
            request.url,
            served.response.status,
            served.source,
            served.route.label()
        );
        Ok(served)
    }

    // Messages

    /// Handle a raw message from `source`. Returns the parsed command, or
    /// `None` when the message carried no type.
    pub async fn handle_message(&self, source: Option<ClientId>, message: &Value) -> Option<ClientCommand> {
        let Some(command) = ClientCommand::parse(message) else {
            log::debug!("Ignoring message without a type");
            return None;
        };
        self.dispatch(source, command.clone()).await;
        Some(command)
    }

    /// Run one command. Failures are logged, never returned to the sender.
    pub async fn dispatch(&self, source: Option<ClientId>, command: ClientCommand) {
        match command {
            ClientCommand::CacheDocument { url, name } => {
                self.cache_document(&url, &name).await;
            }
            ClientCommand::CacheDataSnapshot { data } => {
                if let Err(e) = self.cache_snapshot(&data) {
                    log::warn!("Failed to cache dagstukkies: {}", e);
                }
            }
            ClientCommand::ClearCache => {
                if let Err(e) = self.clear_all_caches() {
                    log::warn!("Failed to clear caches: {}", e);
                }
            }
            ClientCommand::GetCacheStatus => {
                let status = self.cache_status();
                match source {
                    Some(id) => {
                        if !self.clients.post(id, WorkerEvent::CacheStatus(status)) {
                            log::debug!("Client {} is gone, dropping cache status", id);
                        }
                    }
                    None => log::debug!("Cache status requested without a source"),
                }
            }
            ClientCommand::SkipWaiting => {
                if let Err(e) = self.skip_waiting().await {
                    log::warn!("Skip waiting failed: {}", e);
                }
            }
            ClientCommand::Unknown(kind) => {
                log::debug!("Ignoring unknown message type: {}", kind);
            }
            ClientCommand::Malformed { kind, reason } => {
                log::debug!("Ignoring malformed {} message: {}", kind, reason);
            }
        }
    }

    /// Fetch a document into the documents bucket and tell every client
    /// whether it worked. Returns the success flag that was broadcast.
    pub async fn cache_document(&self, url: &str, name: &str) -> bool {
        let success = match self.store_document(url).await {
            Ok(()) => {
                log::info!("Cached document: {}", name);
                true
            }
            Err(e) => {
                log::info!("Failed to cache document {}: {}", name, e);
                false
            }
        };

        self.broadcast(WorkerEvent::DocumentCached {
            url: url.to_string(),
            name: name.to_string(),
            success,
        });
        success
    }

    async fn store_document(&self, url: &str) -> Result<()> {
        let url = self.config.resolve_url(url)?;
        let response = self.fetcher.fetch(&Request::get(url.clone())).await?;
        if !response.is_ok() {
            return Err(Error::Other(format!("server returned {}", response.status)));
        }
        self.store
            .put(&self.config.bucket_name(Bucket::Documents), &url, &response)?;
        Ok(())
    }

    /// Store `data` as a JSON response under the snapshot key
    pub fn cache_snapshot(&self, data: &Value) -> Result<()> {
        let key = self.config.resolve_url(&self.config.cache.snapshot_key)?;
        self.store.put(
            &self.config.bucket_name(Bucket::Data),
            &key,
            &Response::json(200, data),
        )?;
        log::info!("Cached dagstukkies");
        Ok(())
    }

    /// Delete every application cache and tell every client. Returns the
    /// deleted names.
    pub fn clear_all_caches(&self) -> Result<Vec<String>> {
        let deleted = self
            .store
            .delete_matching(|name| self.config.is_app_cache(name))?;
        log::info!("All caches cleared ({} removed)", deleted.len());
        self.broadcast(WorkerEvent::CachesCleared { success: true });
        Ok(deleted)
    }

    /// Entry count per application cache. Unreadable caches count as zero.
    pub fn cache_status(&self) -> BTreeMap<String, usize> {
        let names = match self.store.keys() {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Failed to list caches: {}", e);
                return BTreeMap::new();
            }
        };

        names
            .into_iter()
            .filter(|name| self.config.is_app_cache(name))
            .map(|name| {
                let count = self.store.entry_count(&name).unwrap_or_else(|e| {
                    log::warn!("Failed to count entries in {}: {}", name, e);
                    0
                });
                (name, count)
            })
            .collect()
    }

    // Lifecycle

    /// Install the configured generation: pre-cache the shell, then skip
    /// waiting and activate.
    pub async fn install(&self) -> Result<InstallReport> {
        let generation = self.config.cache.generation.clone();
        log::info!("Installing generation {}", generation);

        {
            let mut reg = self.registration_lock();
            if !reg.state.can_transition_to(LifecycleState::Installing) {
                log::warn!("Previous install of this worker did not finish ({})", reg.state);
                reg.state = LifecycleState::Redundant;
            }
            reg.transition(LifecycleState::Installing)?;
            reg.waiting_generation = Some(generation.clone());
            reg.save(&self.store)?;
        }

        let assets_cached = match precache_shell(&self.config, &self.store, self.fetcher.as_ref()).await {
            Ok(count) => count,
            Err(reason) => {
                log::warn!("Install error: {}", reason);
                let mut reg = self.registration_lock();
                if reg.active_generation.as_deref() != Some(generation.as_str()) {
                    self.discard_empty_shell_bucket();
                }
                reg.transition(LifecycleState::Redundant)?;
                reg.waiting_generation = None;
                reg.save(&self.store)?;
                return Err(Error::InstallFailed { generation, reason });
            }
        };

        {
            let mut reg = self.registration_lock();
            reg.transition(LifecycleState::Waiting)?;
            reg.save(&self.store)?;
        }
        log::info!("Installed generation {} ({} shell assets)", generation, assets_cached);

        let activation = self.skip_waiting().await?;

        Ok(InstallReport {
            generation,
            assets_cached,
            activation,
        })
    }

    /// Activate the waiting generation: drop caches of older generations and
    /// take control of every open client. Re-running on an active worker
    /// repeats the cleanup and claim.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let configured = &self.config.cache.generation;
        let generation = {
            let mut reg = self.registration_lock();
            match reg.state {
                LifecycleState::Waiting => {
                    let waiting = reg
                        .waiting_generation
                        .clone()
                        .unwrap_or_else(|| configured.clone());
                    if waiting != *configured {
                        return Err(generation_mismatch("Waiting", &waiting, configured));
                    }
                    reg.transition(LifecycleState::Activating)?;
                    reg.save(&self.store)?;
                    waiting
                }
                LifecycleState::Active => {
                    let active = reg
                        .active_generation
                        .clone()
                        .unwrap_or_else(|| configured.clone());
                    // Only the configured generation is ever purged for
                    if active != *configured {
                        return Err(generation_mismatch("Active", &active, configured));
                    }
                    active
                }
                state => {
                    return Err(Error::Other(format!(
                        "No installed worker to activate (state: {})",
                        state
                    )));
                }
            }
        };

        log::info!("Activating generation {}", generation);
        let deleted_caches = purge_stale_caches(&self.config, &self.store, &generation)?;
        let claimed_clients = self.clients.claim();

        {
            let mut reg = self.registration_lock();
            if reg.state == LifecycleState::Activating {
                reg.transition(LifecycleState::Active)?;
            }
            reg.active_generation = Some(generation.clone());
            reg.waiting_generation = None;
            reg.save(&self.store)?;
        }

        Ok(ActivationReport {
            generation,
            deleted_caches,
            claimed_clients,
        })
    }

    /// Remove the static bucket a failed install opened, unless something
    /// was stored in it since.
    fn discard_empty_shell_bucket(&self) {
        let bucket = self.config.bucket_name(Bucket::Static);
        if !matches!(self.store.entry_count(&bucket), Ok(0)) {
            return;
        }
        match self.store.delete(&bucket) {
            Ok(_) => log::debug!("Removed empty cache {}", bucket),
            Err(e) => log::warn!("Failed to remove empty cache {}: {}", bucket, e),
        }
    }

    /// Promote a waiting generation. No-op when nothing waits.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>> {
        if self.registration_lock().state != LifecycleState::Waiting {
            log::debug!("Skip waiting: no waiting worker");
            return Ok(None);
        }
        self.activate().await.map(Some)
    }

    // Sync

    /// Forward a background sync tag to every client
    pub fn handle_sync(&self, tag: &str) -> Option<WorkerEvent> {
        log::info!("Sync event: {}", tag);
        let event = sync::sync_event(tag);
        match &event {
            Some(event) => {
                self.broadcast(event.clone());
            }
            None => log::debug!("Ignoring unknown sync tag: {}", tag),
        }
        event
    }

    /// Forward a periodic sync tag to every client
    pub fn handle_periodic_sync(&self, tag: &str) -> Option<WorkerEvent> {
        log::info!("Periodic sync event: {}", tag);
        let event = sync::periodic_sync_event(tag);
        match &event {
            Some(event) => {
                self.broadcast(event.clone());
            }
            None => log::debug!("Ignoring unknown periodic sync tag: {}", tag),
        }
        event
    }

    // Push

    /// Build and show a notification for a push payload
    pub fn handle_push(&self, payload: Option<&[u8]>) -> NotificationIntent {
        log::info!("Push notification received");
        let intent = NotificationIntent::from_push(payload, &self.config.notifications);
        self.shown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(intent.clone());
        intent
    }

    /// Route a notification click to a window
    pub fn handle_notification_click(&self, action: &str, data: &Value) -> Result<ClickOutcome> {
        log::info!("Notification clicked: {}", action);

        let Some(target) = click_target(action, data) else {
            return Ok(ClickOutcome::Dismissed);
        };

        let origin = self.config.origin_url()?.origin().ascii_serialization();
        let window = self
            .clients
            .match_all(true, Some(ClientKind::Window))
            .into_iter()
            .find(|client| client.url.contains(&origin));

        if let Some(window) = window {
            self.clients.post(
                window.id,
                WorkerEvent::NotificationClicked {
                    action: action.to_string(),
                    data: data.clone(),
                    url: target.clone(),
                },
            );
            self.clients.focus(window.id);
            return Ok(ClickOutcome::Focused {
                client: window.id,
                url: target,
            });
        }

        let url = self.config.resolve_url(&target)?;
        let (client, _rx) = self.clients.open_window(url.as_str());
        Ok(ClickOutcome::Opened {
            client,
            url: url.to_string(),
        })
    }

    /// Tell every client a notification was dismissed
    pub fn handle_notification_close(&self, data: &Value) -> WorkerEvent {
        log::info!("Notification closed");
        let event = WorkerEvent::NotificationDismissed {
            id: dismissed_id(data),
        };
        self.broadcast(event.clone());
        event
    }

    /// Tell every client the push subscription changed
    pub fn handle_subscription_change(
        &self,
        old_subscription: Option<PushSubscription>,
        new_subscription: Option<PushSubscription>,
    ) -> WorkerEvent {
        log::info!("Push subscription changed");
        let event = WorkerEvent::PushSubscriptionChanged {
            old_subscription,
            new_subscription,
        };
        self.broadcast(event.clone());
        event
    }
}

fn generation_mismatch(state: &str, registered: &str, configured: &str) -> Error {
    Error::Other(format!(
        "{} generation is {} but {} is configured; run 'nhka-offline install' first",
        state, registered, configured
    ))
}
