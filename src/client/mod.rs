//! Network seam for the worker
//!
//! The worker never talks to reqwest directly. Every outgoing request goes
//! through the [`Fetcher`] trait so strategies can be exercised against a
//! mock network, a forced-offline network, or the real HTTP client.

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::NetworkError;

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::{HttpFetcher, OfflineFetcher};
#[cfg(test)]
pub use mock::MockFetcher;

/// How the request was initiated by the foreground page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation
    Navigate,
    /// Any subresource or programmatic fetch
    #[default]
    Subresource,
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    /// A plain GET subresource request
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Subresource,
        }
    }

    /// A GET page navigation
    pub fn navigate(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Navigate,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A complete, buffered response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with a JSON body
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(
            status,
            vec![("content-type".to_string(), "application/json".to_string())],
            value.to_string().into_bytes(),
        )
    }

    /// A plain-text response
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(
            status,
            vec![("content-type".to_string(), "text/plain".to_string())],
            body.as_bytes().to_vec(),
        )
    }

    /// Whether the status is in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text, if it is valid UTF-8
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Anything that can turn a request into a response over the network
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Non-2xx statuses are still `Ok`; only failures
    /// that produced no response at all are errors.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        (**self).fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_ok_range() {
        assert!(Response::text(200, "ok").is_ok());
        assert!(Response::text(204, "").is_ok());
        assert!(!Response::text(304, "").is_ok());
        assert!(!Response::text(404, "missing").is_ok());
        assert!(!Response::text(503, "Offline").is_ok());
    }

    #[test]
    fn test_json_response_headers() {
        let resp = Response::json(503, &serde_json::json!({"error": "Offline"}));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert_eq!(resp.body_text(), Some(r#"{"error":"Offline"}"#));
    }

    #[test]
    fn test_request_constructors() {
        let url = Url::parse("http://localhost/app").unwrap();
        assert!(!Request::get(url.clone()).is_navigation());
        assert!(Request::navigate(url.clone()).is_navigation());
        let post = Request::get(url).with_method(Method::POST);
        assert_eq!(post.method, Method::POST);
    }
}
