//! Fetch strategies
//!
//! Network-first serves API data and unclassified requests: live data when
//! reachable, the cached copy when not. Cache-first-with-refresh serves
//! documents and static assets: the cached copy immediately, with a
//! background refresh so the next read is fresher.
//!
//! A failed cache write never fails the response. Concurrent misses for the
//! same request may both fetch and both write; the last write wins.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;

use super::classify::{Route, Strategy, classify};
use super::tasks::BackgroundTasks;
use crate::cache::CacheStore;
use crate::client::{Fetcher, Request, Response};
use crate::config::Config;
use crate::error::NetworkError;

/// Body of the synthesized offline response for data requests
pub const OFFLINE_JSON_MESSAGE: &str = "Nie aanlyn nie";

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Network,
    Cache,
    AppShell,
    Synthesized,
    Passthrough,
}

/// A response handed back to the page
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
    pub route: Route,
}

/// Applies the per-route strategy to intercepted requests
pub struct StrategyEngine<F: Fetcher + 'static> {
    config: Arc<Config>,
    store: Arc<CacheStore>,
    fetcher: Arc<F>,
    tasks: Arc<BackgroundTasks>,
}

impl<F: Fetcher + 'static> StrategyEngine<F> {
    pub fn new(
        config: Arc<Config>,
        store: Arc<CacheStore>,
        fetcher: Arc<F>,
        tasks: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            tasks,
        }
    }

    /// Classify and serve one request.
    ///
    /// Only bypassed requests can fail: they go to the network untouched and
    /// their failure is the page's to handle.
    pub async fn handle(&self, request: &Request) -> Result<Served, NetworkError> {
        let route = classify(request, &self.config.routes);

        let (response, source) = match (route.strategy(), route.bucket()) {
            (Strategy::NetworkFirst, Some(bucket)) => {
                self.network_first(request, &self.config.bucket_name(bucket))
                    .await
            }
            (Strategy::CacheFirstWithRefresh, Some(bucket)) => {
                self.cache_first(request, &self.config.bucket_name(bucket))
                    .await
            }
            _ => {
                log::debug!("Bypassing {} ({})", request.url, route.label());
                (self.fetcher.fetch(request).await?, ServedFrom::Passthrough)
            }
        };

        Ok(Served {
            response,
            source,
            route,
        })
    }

    /// Try the network; fall back to the bucket, then the app shell, then a
    /// synthesized 503.
    pub async fn network_first(&self, request: &Request, bucket: &str) -> (Response, ServedFrom) {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    store_copy(&self.store, bucket, &request.url, &response);
                }
                (response, ServedFrom::Network)
            }
            Err(e) => {
                log::info!("Network failed ({}), trying cache for: {}", e, request.url);

                if let Some(cached) = lookup(&self.store, bucket, &request.url) {
                    return (cached, ServedFrom::Cache);
                }

                if request.is_navigation() {
                    if let Some(shell) = self.app_shell() {
                        return (shell, ServedFrom::AppShell);
                    }
                }

                (
                    Response::json(
                        503,
                        &serde_json::json!({
                            "error": "Offline",
                            "message": OFFLINE_JSON_MESSAGE,
                        }),
                    ),
                    ServedFrom::Synthesized,
                )
            }
        }
    }

    /// Serve from the bucket and refresh in the background; on a miss, go
    /// to the network.
    pub async fn cache_first(&self, request: &Request, bucket: &str) -> (Response, ServedFrom) {
        if let Some(cached) = lookup(&self.store, bucket, &request.url) {
            self.spawn_refresh(request.clone(), bucket.to_string());
            return (cached, ServedFrom::Cache);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    store_copy(&self.store, bucket, &request.url, &response);
                }
                (response, ServedFrom::Network)
            }
            Err(e) => {
                log::info!("Failed to fetch {}: {}", request.url, e);
                (Response::text(503, "Offline"), ServedFrom::Synthesized)
            }
        }
    }

    /// Cached root document of the application, searched across every
    /// application cache
    fn app_shell(&self) -> Option<Response> {
        let root = self.config.resolve_url("/").ok()?;
        match self
            .store
            .match_any(&root, |name| self.config.is_app_cache(name))
        {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("App shell lookup failed: {}", e);
                None
            }
        }
    }

    /// Fire-and-forget refresh of a cached entry.
    ///
    /// There is no cancellation. A refresh is bounded by the HTTP client's
    /// request timeout, plus `background_refresh_timeout_secs` when set.
    fn spawn_refresh(&self, request: Request, bucket: String) {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let limit = self
            .config
            .network
            .background_refresh_timeout_secs
            .map(Duration::from_secs);

        self.tasks.spawn(async move {
            let attempt = fetcher.fetch(&request);
            let result = match limit {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(NetworkError::Timeout),
                },
                None => attempt.await,
            };

            match result {
                Ok(response) if response.is_ok() => {
                    store_copy(&store, &bucket, &request.url, &response);
                    log::debug!("Refreshed {} in {}", request.url, bucket);
                }
                Ok(response) => {
                    log::debug!(
                        "Refresh of {} returned {}, keeping cached copy",
                        request.url,
                        response.status
                    );
                }
                Err(e) => log::debug!("Background refresh of {} failed: {}", request.url, e),
            }
        });
    }
}

/// Cache read on the response path; errors count as a miss
fn lookup(store: &CacheStore, bucket: &str, url: &Url) -> Option<Response> {
    match store.match_in(bucket, url) {
        Ok(hit) => hit,
        Err(e) => {
            log::warn!("Cache read failed for {}: {}", url, e);
            None
        }
    }
}

/// Best-effort cache write; failures are logged and swallowed
fn store_copy(store: &CacheStore, bucket: &str, url: &Url, response: &Response) {
    if let Err(e) = store.put(bucket, url, response) {
        log::warn!("Failed to cache {} in {}: {}", url, bucket, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockFetcher;
    use crate::config::Bucket;
    use tempfile::TempDir;

    const ORIGIN: &str = "http://localhost:5173";

    struct Harness {
        engine: StrategyEngine<MockFetcher>,
        net: Arc<MockFetcher>,
        store: Arc<CacheStore>,
        tasks: Arc<BackgroundTasks>,
        config: Arc<Config>,
        _dir: TempDir,
    }

    fn harness(net: MockFetcher) -> Harness {
        harness_with(net, Config::default())
    }

    fn harness_with(net: MockFetcher, config: Config) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::open_at(dir.path()).unwrap());
        let net = Arc::new(net);
        let tasks = Arc::new(BackgroundTasks::new());
        let config = Arc::new(config);
        let engine = StrategyEngine::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&net),
            Arc::clone(&tasks),
        );
        Harness {
            engine,
            net,
            store,
            tasks,
            config,
            _dir: dir,
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn abs(path: &str) -> String {
        url(path).to_string()
    }

    #[tokio::test]
    async fn test_network_first_caches_fresh_response() {
        let h = harness(
            MockFetcher::new().with_response(&abs("/rest/v1/gemeentes"), Response::text(200, "[1]")),
        );

        let served = h.engine.handle(&Request::get(url("/rest/v1/gemeentes"))).await.unwrap();

        assert_eq!(served.route, Route::Api);
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body_text(), Some("[1]"));

        let cached = h
            .store
            .match_in(&h.config.bucket_name(Bucket::Data), &url("/rest/v1/gemeentes"))
            .unwrap();
        assert_eq!(cached.unwrap().body_text(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_network_first_offline_replays_cached_body() {
        let h = harness(
            MockFetcher::new().with_response(&abs("/rest/v1/gemeentes"), Response::text(200, "[1]")),
        );
        let request = Request::get(url("/rest/v1/gemeentes"));
        h.engine.handle(&request).await.unwrap();

        h.net.set_offline(true);
        let served = h.engine.handle(&request).await.unwrap();

        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body_text(), Some("[1]"));
        assert_eq!(h.net.call_count(&abs("/rest/v1/gemeentes")).await, 2);
    }

    #[tokio::test]
    async fn test_network_first_does_not_cache_errors() {
        let h = harness(
            MockFetcher::new().with_response(&abs("/rest/v1/wyke"), Response::text(500, "boom")),
        );

        let served = h.engine.handle(&Request::get(url("/rest/v1/wyke"))).await.unwrap();

        assert_eq!(served.response.status, 500);
        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(
            h.store.entry_count(&h.config.bucket_name(Bucket::Data)).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_network_first_offline_miss_synthesizes_json_503() {
        let h = harness(MockFetcher::new());
        h.net.set_offline(true);

        let served = h.engine.handle(&Request::get(url("/rest/v1/wyke"))).await.unwrap();

        assert_eq!(served.source, ServedFrom::Synthesized);
        assert_eq!(served.response.status, 503);
        assert_eq!(served.response.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&served.response.body).unwrap();
        assert_eq!(body["error"], "Offline");
        assert_eq!(body["message"], OFFLINE_JSON_MESSAGE);
    }

    #[tokio::test]
    async fn test_offline_navigation_falls_back_to_app_shell() {
        let h = harness(MockFetcher::new());
        h.store
            .put(
                &h.config.bucket_name(Bucket::Static),
                &url("/"),
                &Response::text(200, "<html>shell</html>"),
            )
            .unwrap();
        h.net.set_offline(true);

        let served = h.engine.handle(&Request::navigate(url("/krisis"))).await.unwrap();

        assert_eq!(served.route, Route::Other);
        assert_eq!(served.source, ServedFrom::AppShell);
        assert_eq!(served.response.body_text(), Some("<html>shell</html>"));
    }

    #[tokio::test]
    async fn test_offline_subresource_does_not_get_app_shell() {
        let h = harness(MockFetcher::new());
        h.store
            .put(
                &h.config.bucket_name(Bucket::Static),
                &url("/"),
                &Response::text(200, "<html>shell</html>"),
            )
            .unwrap();
        h.net.set_offline(true);

        let served = h.engine.handle(&Request::get(url("/krisis"))).await.unwrap();
        assert_eq!(served.source, ServedFrom::Synthesized);
    }

    #[tokio::test]
    async fn test_cache_first_hit_returns_without_waiting_and_refreshes() {
        let h = harness(
            MockFetcher::new()
                .with_response(&abs("/app/bundle.js"), Response::text(200, "v2"))
                .with_delay(Duration::from_millis(200)),
        );
        let bucket = h.config.bucket_name(Bucket::Static);
        h.store
            .put(&bucket, &url("/app/bundle.js"), &Response::text(200, "v1"))
            .unwrap();

        let started = std::time::Instant::now();
        let served = h.engine.handle(&Request::get(url("/app/bundle.js"))).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(served.route, Route::Static);
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body_text(), Some("v1"));

        h.tasks.wait_idle().await;
        let refreshed = h.store.match_in(&bucket, &url("/app/bundle.js")).unwrap().unwrap();
        assert_eq!(refreshed.body_text(), Some("v2"));
    }

    #[tokio::test]
    async fn test_cache_first_failed_refresh_keeps_entry() {
        let h = harness(MockFetcher::new());
        let bucket = h.config.bucket_name(Bucket::Documents);
        h.store
            .put(&bucket, &url("/omsendbrief.pdf"), &Response::text(200, "pdf"))
            .unwrap();
        h.net.set_offline(true);

        let served = h.engine.handle(&Request::get(url("/omsendbrief.pdf"))).await.unwrap();
        h.tasks.wait_idle().await;

        assert_eq!(served.source, ServedFrom::Cache);
        let kept = h.store.match_in(&bucket, &url("/omsendbrief.pdf")).unwrap().unwrap();
        assert_eq!(kept.body_text(), Some("pdf"));
    }

    #[tokio::test]
    async fn test_cache_first_refresh_respects_timeout() {
        let mut config = Config::default();
        config.network.background_refresh_timeout_secs = Some(0);
        let h = harness_with(
            MockFetcher::new()
                .with_response(&abs("/logo.svg"), Response::text(200, "new"))
                .with_delay(Duration::from_millis(100)),
            config,
        );
        let bucket = h.config.bucket_name(Bucket::Static);
        h.store
            .put(&bucket, &url("/logo.svg"), &Response::text(200, "old"))
            .unwrap();

        h.engine.handle(&Request::get(url("/logo.svg"))).await.unwrap();
        h.tasks.wait_idle().await;

        let kept = h.store.match_in(&bucket, &url("/logo.svg")).unwrap().unwrap();
        assert_eq!(kept.body_text(), Some("old"));
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let h = harness(
            MockFetcher::new().with_response(&abs("/styles/app.css"), Response::text(200, "body{}")),
        );

        let served = h.engine.handle(&Request::get(url("/styles/app.css"))).await.unwrap();

        assert_eq!(served.source, ServedFrom::Network);
        assert!(h.tasks.is_empty());
        let cached = h
            .store
            .match_in(&h.config.bucket_name(Bucket::Static), &url("/styles/app.css"))
            .unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_cache_first_offline_miss_is_plain_503() {
        let h = harness(MockFetcher::new());
        h.net.set_offline(true);

        let served = h.engine.handle(&Request::get(url("/app/bundle.js"))).await.unwrap();

        assert_eq!(served.source, ServedFrom::Synthesized);
        assert_eq!(served.response.status, 503);
        assert_eq!(served.response.body_text(), Some("Offline"));
    }

    #[tokio::test]
    async fn test_functions_never_cached() {
        let fn_url = "https://abc.supabase.co/functions/v1/rag-chat";
        let h = harness(MockFetcher::new().with_response(fn_url, Response::text(200, "answer")));
        let request = Request::get(Url::parse(fn_url).unwrap());

        for _ in 0..3 {
            let served = h.engine.handle(&request).await.unwrap();
            assert_eq!(served.source, ServedFrom::Passthrough);
        }

        let stats = h.store.stats().unwrap();
        assert_eq!(stats.total_entries, 0);
        assert!(
            h.store
                .match_any(&request.url, |_| true)
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_bypass_surfaces_network_error() {
        let h = harness(MockFetcher::new());
        h.net.set_offline(true);
        let request = Request::get(url("/rest/v1/wyke")).with_method(reqwest::Method::POST);

        let result = h.engine.handle(&request).await;
        assert!(matches!(result, Err(NetworkError::Offline)));
    }

    #[tokio::test]
    async fn test_other_requests_use_default_bucket() {
        let h = harness(MockFetcher::new().with_response(&abs("/program"), Response::text(200, "p")));

        h.engine.handle(&Request::get(url("/program"))).await.unwrap();

        assert_eq!(
            h.store.entry_count(&h.config.bucket_name(Bucket::Default)).unwrap(),
            1
        );
    }
}
