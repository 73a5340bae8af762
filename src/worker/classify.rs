//! Request classification
//!
//! Decides, from the URL alone, which bucket and which strategy serve an
//! intercepted request. Order matters: API, then Document, then Static,
//! then the catch-all. The first match wins.

use reqwest::Method;
use serde::Serialize;

use crate::client::Request;
use crate::config::{Bucket, RouteSettings};

/// Why a request is handed to the network untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    /// Only GET is ever cached
    NonGet,
    /// Extension or data URLs
    NonHttp,
    /// Function responses are per-request and never cached
    ServerlessFunction,
}

/// Classification of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Api,
    Document,
    Static,
    Other,
    Bypass(BypassReason),
}

/// Caching policy applied to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirstWithRefresh,
    Passthrough,
}

impl Route {
    /// Bucket the route reads from and writes to
    pub fn bucket(self) -> Option<Bucket> {
        match self {
            Route::Api => Some(Bucket::Data),
            Route::Document => Some(Bucket::Documents),
            Route::Static => Some(Bucket::Static),
            Route::Other => Some(Bucket::Default),
            Route::Bypass(_) => None,
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Route::Api | Route::Other => Strategy::NetworkFirst,
            Route::Document | Route::Static => Strategy::CacheFirstWithRefresh,
            Route::Bypass(_) => Strategy::Passthrough,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Route::Api => "api",
            Route::Document => "document",
            Route::Static => "static",
            Route::Other => "other",
            Route::Bypass(BypassReason::NonGet) => "bypass (non-GET)",
            Route::Bypass(BypassReason::NonHttp) => "bypass (non-HTTP)",
            Route::Bypass(BypassReason::ServerlessFunction) => "bypass (function)",
        }
    }
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::NetworkFirst => "network-first",
            Strategy::CacheFirstWithRefresh => "cache-first-with-refresh",
            Strategy::Passthrough => "passthrough",
        }
    }
}

/// Classify an intercepted request
pub fn classify(request: &Request, routes: &RouteSettings) -> Route {
    if request.method != Method::GET {
        return Route::Bypass(BypassReason::NonGet);
    }

    if !matches!(request.url.scheme(), "http" | "https") {
        return Route::Bypass(BypassReason::NonHttp);
    }

    let path = request.url.path();
    let host = request.url.host_str().unwrap_or("");

    if is_api(path, host, routes) {
        if path.contains(&routes.function_marker) {
            return Route::Bypass(BypassReason::ServerlessFunction);
        }
        return Route::Api;
    }

    if is_document(path, routes) {
        return Route::Document;
    }

    if is_static(path, routes) {
        return Route::Static;
    }

    Route::Other
}

fn is_api(path: &str, host: &str, routes: &RouteSettings) -> bool {
    routes.api_patterns.iter().any(|p| path.contains(p.as_str()))
        || host.contains(&routes.backend_host_marker)
}

fn is_document(path: &str, routes: &RouteSettings) -> bool {
    routes
        .document_extensions
        .iter()
        .any(|ext| path.ends_with(ext.as_str()))
        || routes
            .document_markers
            .iter()
            .any(|m| path.contains(m.as_str()))
}

fn is_static(path: &str, routes: &RouteSettings) -> bool {
    routes
        .static_extensions
        .iter()
        .any(|ext| path.ends_with(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn route_of(url: &str) -> Route {
        let request = Request::get(Url::parse(url).unwrap());
        classify(&request, &RouteSettings::default())
    }

    #[test]
    fn test_api_by_path_pattern() {
        assert_eq!(route_of("http://localhost:5173/rest/v1/gemeentes"), Route::Api);
        assert_eq!(
            route_of("http://localhost:5173/rest/v1/pastorale_aksies?select=*"),
            Route::Api
        );
    }

    #[test]
    fn test_api_by_backend_host() {
        assert_eq!(route_of("https://abc.supabase.co/auth/v1/user"), Route::Api);
    }

    #[test]
    fn test_functions_are_bypassed() {
        assert_eq!(
            route_of("https://abc.supabase.co/functions/v1/rag-chat"),
            Route::Bypass(BypassReason::ServerlessFunction)
        );
    }

    #[test]
    fn test_non_get_bypasses() {
        let request = Request::get(Url::parse("http://localhost/rest/v1/wyke").unwrap())
            .with_method(Method::POST);
        assert_eq!(
            classify(&request, &RouteSettings::default()),
            Route::Bypass(BypassReason::NonGet)
        );
    }

    #[test]
    fn test_non_http_bypasses() {
        assert_eq!(
            route_of("chrome-extension://abcdef/script.js"),
            Route::Bypass(BypassReason::NonHttp)
        );
    }

    #[test]
    fn test_documents_by_extension_and_marker() {
        assert_eq!(route_of("http://localhost/omsendbrief.pdf"), Route::Document);
        assert_eq!(route_of("http://localhost/begroting.xlsx"), Route::Document);
        assert_eq!(
            route_of("http://localhost/gemeente-dokumente/notule"),
            Route::Document
        );
    }

    #[test]
    fn test_document_wins_over_static() {
        // Under a storage path and looks like an image
        assert_eq!(route_of("http://localhost/storage/logo.png"), Route::Document);
    }

    #[test]
    fn test_api_wins_over_document() {
        assert_eq!(
            route_of("https://abc.supabase.co/storage/v1/object/brief.pdf"),
            Route::Api
        );
    }

    #[test]
    fn test_static_assets() {
        assert_eq!(route_of("http://localhost/app/bundle.js"), Route::Static);
        assert_eq!(route_of("http://localhost/fonts/inter.woff2"), Route::Static);
        assert_eq!(route_of("http://localhost/favicon.ico"), Route::Static);
    }

    #[test]
    fn test_other_fallback() {
        assert_eq!(route_of("http://localhost/krisis"), Route::Other);
        assert_eq!(route_of("http://localhost/"), Route::Other);
    }

    #[test]
    fn test_route_bucket_and_strategy() {
        assert_eq!(Route::Api.bucket(), Some(Bucket::Data));
        assert_eq!(Route::Api.strategy(), Strategy::NetworkFirst);
        assert_eq!(Route::Static.strategy(), Strategy::CacheFirstWithRefresh);
        assert_eq!(Route::Other.bucket(), Some(Bucket::Default));
        assert_eq!(
            Route::Bypass(BypassReason::NonGet).strategy(),
            Strategy::Passthrough
        );
        assert_eq!(Route::Bypass(BypassReason::NonGet).bucket(), None);
    }
}
