//! Response display model

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::client::Response;
use crate::worker::classify::Route;
use crate::worker::strategy::{Served, ServedFrom};

/// A served response for JSON output. Text bodies are inlined; anything
/// that is not UTF-8 is base64 encoded.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseDisplay {
    pub url: String,
    pub route: Route,
    pub source: ServedFrom,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
}

impl ResponseDisplay {
    pub fn new(url: &str, served: &Served, include_body: bool) -> Self {
        let response: &Response = &served.response;
        let (body, body_base64) = match (include_body, response.body_text()) {
            (false, _) => (None, None),
            (true, Some(text)) => (Some(text.to_string()), None),
            (true, None) => (None, Some(STANDARD.encode(&response.body))),
        };

        Self {
            url: url.to_string(),
            route: served.route,
            source: served.source,
            status: response.status,
            headers: response.headers.clone(),
            size_bytes: response.body.len(),
            body,
            body_base64,
        }
    }
}
