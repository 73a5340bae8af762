//! reqwest-backed fetcher and the forced-offline fetcher

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::{Fetcher, Request, Response};
use crate::error::{NetworkError, Result};

/// Real network access through reqwest
pub struct HttpFetcher {
    http: HttpClient,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!("nhka-offline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(NetworkError::from)?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, NetworkError> {
        log::debug!("{} {}", request.method, request.url);

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Response::new(status, headers, body))
    }
}

/// A network that is always down (`--offline`)
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, NetworkError> {
        log::debug!("Offline: refusing {}", request.url);
        Err(NetworkError::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    #[tokio::test]
    async fn test_fetch_captures_status_headers_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/gemeentes")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"naam":"Pretoria-Oos"}]"#)
            .expect(1)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/rest/v1/gemeentes", server.url())).unwrap();
        let resp = fetcher.fetch(&Request::get(url)).await.unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        assert!(resp.body_text().unwrap().contains("Pretoria-Oos"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.pdf")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/missing.pdf", server.url())).unwrap();
        let resp = fetcher.fetch(&Request::get(url)).await.unwrap();

        assert_eq!(resp.status, 404);
        assert!(!resp.is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let result = fetcher.fetch(&Request::get(url)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_offline_fetcher_always_fails() {
        let url = Url::parse("http://localhost/").unwrap();
        let result = OfflineFetcher.fetch(&Request::get(url)).await;
        assert!(matches!(result, Err(NetworkError::Offline)));
    }
}
