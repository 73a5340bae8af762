//! Worker lifecycle
//!
//! A generation moves through `installing → waiting → activating → active`.
//! Installing pre-caches the application shell; activating removes caches
//! left behind by older generations. The registration is persisted in the
//! cache store so every run sees the same worker.

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde::Serialize;

use crate::cache::{CacheStore, RegistrationRecord};
use crate::client::{Fetcher, Request, Response};
use crate::config::{Bucket, Config};
use crate::error::{Error, Result};

/// State of the newest worker generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Never installed
    Parsed,
    Installing,
    Waiting,
    Activating,
    Active,
    /// Install failed or the generation was replaced
    Redundant,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parsed" => Some(LifecycleState::Parsed),
            "installing" => Some(LifecycleState::Installing),
            "waiting" => Some(LifecycleState::Waiting),
            "activating" => Some(LifecycleState::Activating),
            "active" => Some(LifecycleState::Active),
            "redundant" => Some(LifecycleState::Redundant),
            _ => None,
        }
    }

    /// Whether `next` may follow this state. A new install may start from
    /// any settled state.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Parsed | Active | Redundant | Waiting, Installing)
                | (Installing, Waiting | Redundant)
                | (Waiting, Activating | Redundant)
                | (Activating, Active | Redundant)
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted registration of the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub state: LifecycleState,
    /// Generation currently controlling clients
    pub active_generation: Option<String>,
    /// Installed generation waiting to take over
    pub waiting_generation: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            state: LifecycleState::Parsed,
            active_generation: None,
            waiting_generation: None,
            updated_at: Utc::now(),
        }
    }
}

impl Registration {
    /// Load the registration, or a fresh one if none was saved
    pub fn load(store: &CacheStore) -> Result<Self> {
        let Some(record) = store.load_registration()? else {
            return Ok(Self::default());
        };

        let state = LifecycleState::parse(&record.state).unwrap_or_else(|| {
            log::warn!("Unknown lifecycle state '{}', starting over", record.state);
            LifecycleState::Parsed
        });

        Ok(Self {
            state,
            active_generation: record.active_generation,
            waiting_generation: record.waiting_generation,
            updated_at: Utc
                .timestamp_opt(record.updated_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }

    pub fn save(&self, store: &CacheStore) -> Result<()> {
        store.save_registration(&RegistrationRecord {
            active_generation: self.active_generation.clone(),
            waiting_generation: self.waiting_generation.clone(),
            state: self.state.as_str().to_string(),
            updated_at: self.updated_at.timestamp(),
        })?;
        Ok(())
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow
    pub fn transition(&mut self, next: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Other(format!(
                "Invalid lifecycle transition: {} -> {}",
                self.state, next
            )));
        }
        log::debug!("Lifecycle: {} -> {}", self.state, next);
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Fetch every shell asset and store them in the static bucket, all or
/// nothing. Returns the number of assets stored.
pub async fn precache_shell<F: Fetcher>(
    config: &Config,
    store: &CacheStore,
    fetcher: &F,
) -> std::result::Result<usize, String> {
    let bucket = config.bucket_name(Bucket::Static);
    store
        .open(&bucket)
        .map_err(|e| format!("cannot open {}: {}", bucket, e))?;

    let mut requests = Vec::with_capacity(config.cache.shell_assets.len());
    for asset in &config.cache.shell_assets {
        let url = config
            .resolve_url(asset)
            .map_err(|e| format!("bad shell asset '{}': {}", asset, e))?;
        requests.push(Request::get(url));
    }

    let results = join_all(requests.iter().map(|r| fetcher.fetch(r))).await;

    let mut fetched: Vec<(&Request, Response)> = Vec::with_capacity(results.len());
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(response) if response.is_ok() => fetched.push((request, response)),
            Ok(response) => {
                return Err(format!("{} returned {}", request.url, response.status));
            }
            Err(e) => return Err(format!("{}: {}", request.url, e)),
        }
    }

    for (i, (request, response)) in fetched.iter().enumerate() {
        if let Err(e) = store.put(&bucket, &request.url, response) {
            // Undo the partial write
            for (written, _) in &fetched[..i] {
                if let Err(e) = store.remove(&bucket, &written.url) {
                    log::warn!("Failed to roll back {}: {}", written.url, e);
                }
            }
            return Err(format!("cannot store {}: {}", request.url, e));
        }
    }

    Ok(fetched.len())
}

/// Delete every application cache not belonging to `generation`; returns
/// their names
pub fn purge_stale_caches(
    config: &Config,
    store: &CacheStore,
    generation: &str,
) -> Result<Vec<String>> {
    let suffix = format!("-{}", generation);
    let deleted =
        store.delete_matching(|name| config.is_app_cache(name) && !name.ends_with(&suffix))?;
    for name in &deleted {
        log::info!("Deleting old cache: {}", name);
    }
    Ok(deleted)
}
