//! Command execution context
//!
//! Every command that touches the worker goes through here: load the
//! config, open the cache store, pick the network, build the worker and
//! connect this invocation as a window at the application origin.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::cache::CacheStore;
use crate::cli::args::GlobalOptions;
use crate::client::{Fetcher, HttpFetcher, OfflineFetcher};
use crate::config::Config;
use crate::error::Result;
use crate::worker::OfflineWorker;
use crate::worker::clients::ClientId;
use crate::worker::messages::WorkerEvent;

/// Worker over whichever network the invocation asked for
pub type CliWorker = OfflineWorker<Box<dyn Fetcher>>;

/// Context for command execution: the worker plus this invocation's window.
pub struct WorkerContext {
    pub worker: CliWorker,
    /// The window this invocation plays
    pub client_id: ClientId,
    inbox: UnboundedReceiver<WorkerEvent>,
}

impl WorkerContext {
    /// Create a new context.
    ///
    /// # Errors
    /// Returns error if the config is invalid or the cache store cannot be
    /// opened.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = load_config(opts)?;
        let store = CacheStore::open_default(config.cache.dir.as_deref())?;

        let fetcher: Box<dyn Fetcher> = if opts.offline {
            log::debug!("Network disabled by --offline");
            Box::new(OfflineFetcher)
        } else {
            Box::new(HttpFetcher::new(Duration::from_secs(
                config.network.request_timeout_secs,
            ))?)
        };

        let worker = OfflineWorker::new(config, store, fetcher)?;
        let origin = worker.config().origin_url()?;
        let (client_id, inbox) = worker.connect_window(origin.as_str());
        log::debug!(
            "Connected as client {} (controlled: {}, {} open)",
            client_id,
            worker.is_active(),
            worker.clients().len()
        );

        Ok(Self {
            worker,
            client_id,
            inbox,
        })
    }

    /// Events posted to this invocation's window so far
    pub fn drain_events(&mut self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.inbox.try_recv() {
            events.push(event);
        }
        events
    }

    /// Let background work settle, then collect every pending event
    pub async fn finish(&mut self) -> Vec<WorkerEvent> {
        self.worker.wait_idle().await;
        self.drain_events()
    }
}

/// Load the config and apply the command-line cache directory override
pub fn load_config(opts: &GlobalOptions) -> Result<Config> {
    let mut config = Config::load_at(opts.config_ref())?;
    if let Some(dir) = opts.cache_dir_ref() {
        config.cache.dir = Some(PathBuf::from(dir));
    }
    config.validate()?;
    Ok(config)
}

/// Cache directory the invocation would use, without opening the store
pub fn cache_dir(opts: &GlobalOptions) -> Result<PathBuf> {
    let config = load_config(opts)?;
    match config.cache.dir {
        Some(dir) => Ok(dir),
        None => Ok(CacheStore::default_dir()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn opts(dir: &TempDir) -> GlobalOptions {
        GlobalOptions {
            config: Some(dir.path().join("missing.yaml").display().to_string()),
            cache_dir: Some(dir.path().join("cache").display().to_string()),
            offline: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_dir_override_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cache_dir(&opts(&dir)).unwrap(), dir.path().join("cache"));
    }

    #[tokio::test]
    async fn test_context_connects_uncontrolled_window_before_install() {
        let dir = TempDir::new().unwrap();
        let mut ctx = WorkerContext::new(&opts(&dir)).unwrap();

        let me = ctx.worker.clients().get(ctx.client_id).unwrap();
        assert_eq!(me.url, "http://localhost:5173/");
        assert!(!me.controlled);
        assert!(ctx.finish().await.is_empty());
    }
}
