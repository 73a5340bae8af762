//! Mock network for testing
//!
//! Serves canned responses per URL without touching the network, and can be
//! flipped offline mid-test to exercise the cache fallbacks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Fetcher, Request, Response};
use crate::error::NetworkError;

/// Mock fetcher for testing.
///
/// # Example
/// ```ignore
/// let net = MockFetcher::new()
///     .with_response("http://app.test/app/bundle.js", Response::text(200, "v1"));
///
/// net.set_offline(true);
/// assert!(net.fetch(&request).await.is_err());
/// ```
#[derive(Default)]
pub struct MockFetcher {
    /// Canned responses keyed by absolute URL
    responses: Mutex<HashMap<String, Response>>,
    /// Simulate a dead network
    offline: AtomicBool,
    /// Artificial latency applied before answering
    delay: Option<Duration>,
    /// Number of fetch attempts per URL
    calls: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned response for a URL
    pub fn with_response(mut self, url: &str, response: Response) -> Self {
        self.responses.get_mut().insert(url.to_string(), response);
        self
    }

    /// Delay every answer by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the canned response for a URL
    pub async fn set_response(&self, url: &str, response: Response) {
        self.responses
            .lock()
            .await
            .insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fetch attempts made for a URL (including failed ones)
    pub async fn call_count(&self, url: &str) -> usize {
        self.calls.lock().await.get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let url = request.url.as_str().to_string();
        *self.calls.lock().await.entry(url.clone()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }

        Ok(self
            .responses
            .lock()
            .await
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::text(404, "Not Found")))
    }
}
