//! Foreground/worker message protocol
//!
//! Both directions use the same envelope: `{ "type": "...", "payload": ... }`.
//! Commands arrive as loose JSON and are parsed into a closed set; events are
//! typed and serialized back into the envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command sent by a foreground client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Fetch a document and keep it for offline reading
    CacheDocument { url: String, name: String },
    /// Store a JSON snapshot under the well-known snapshot key
    CacheDataSnapshot { data: Value },
    /// Delete every application cache
    ClearCache,
    /// Reply with entry counts per application cache
    GetCacheStatus,
    /// Promote a waiting worker generation
    SkipWaiting,
    /// A type this worker does not handle
    Unknown(String),
    /// A known type with a payload missing required fields
    Malformed { kind: String, reason: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl ClientCommand {
    /// Parse a raw message. Messages without a `type` are not commands and
    /// yield `None`.
    pub fn parse(message: &Value) -> Option<Self> {
        let envelope = Envelope::deserialize(message).ok()?;
        let kind = envelope.kind.filter(|k| !k.is_empty())?;
        let payload = envelope.payload;

        let command = match kind.as_str() {
            "CACHE_DOCUMENT" => {
                match (non_empty_str(&payload, "url"), non_empty_str(&payload, "name")) {
                    (Some(url), Some(name)) => ClientCommand::CacheDocument { url, name },
                    _ => ClientCommand::Malformed {
                        kind,
                        reason: "payload needs non-empty `url` and `name`".to_string(),
                    },
                }
            }
            "CACHE_DAGSTUKKIES" | "CACHE_DATA_SNAPSHOT" => match payload.get("data") {
                Some(data) if !is_falsy(data) => ClientCommand::CacheDataSnapshot { data: data.clone() },
                _ => ClientCommand::Malformed {
                    kind,
                    reason: "payload needs `data`".to_string(),
                },
            },
            "CLEAR_CACHE" => ClientCommand::ClearCache,
            "GET_CACHE_STATUS" => ClientCommand::GetCacheStatus,
            "SKIP_WAITING" => ClientCommand::SkipWaiting,
            _ => ClientCommand::Unknown(kind),
        };

        Some(command)
    }
}

fn non_empty_str(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Values a foreground page would treat as "no data"
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Push subscription as exposed to the foreground
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, String>>,
}

/// A message posted by the worker to one or more clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerEvent {
    DocumentCached {
        url: String,
        name: String,
        success: bool,
    },
    CachesCleared {
        success: bool,
    },
    /// Entry count per application cache
    CacheStatus(BTreeMap<String, usize>),
    SyncPastoralActions,
    SyncCrisisReports,
    SyncAll,
    PeriodicSync,
    NotificationClicked {
        action: String,
        data: Value,
        url: String,
    },
    NotificationDismissed {
        id: Value,
    },
    #[serde(rename_all = "camelCase")]
    PushSubscriptionChanged {
        old_subscription: Option<PushSubscription>,
        new_subscription: Option<PushSubscription>,
    },
}

impl WorkerEvent {
    /// The envelope `type` of this event
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::DocumentCached { .. } => "DOCUMENT_CACHED",
            WorkerEvent::CachesCleared { .. } => "CACHES_CLEARED",
            WorkerEvent::CacheStatus(_) => "CACHE_STATUS",
            WorkerEvent::SyncPastoralActions => "SYNC_PASTORAL_ACTIONS",
            WorkerEvent::SyncCrisisReports => "SYNC_CRISIS_REPORTS",
            WorkerEvent::SyncAll => "SYNC_ALL",
            WorkerEvent::PeriodicSync => "PERIODIC_SYNC",
            WorkerEvent::NotificationClicked { .. } => "NOTIFICATION_CLICKED",
            WorkerEvent::NotificationDismissed { .. } => "NOTIFICATION_DISMISSED",
            WorkerEvent::PushSubscriptionChanged { .. } => "PUSH_SUBSCRIPTION_CHANGED",
        }
    }
}
