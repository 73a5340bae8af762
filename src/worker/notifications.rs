//! Push notifications
//!
//! Turns raw push payloads into notifications to display, and maps
//! notification clicks to in-app routes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::clients::ClientId;
use super::messages::is_falsy;
use crate::config::NotificationDefaults;

const URGENT_VIBRATION: [u32; 5] = [200, 100, 200, 100, 200];
const NORMAL_VIBRATION: [u32; 3] = [100, 50, 100];

/// Urgency of a push, read from its `priority` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Urgent,
    High,
    Normal,
}

impl Urgency {
    /// Unknown or missing priorities are normal
    pub fn from_priority(priority: Option<&str>) -> Self {
        match priority {
            Some("urgent") => Urgency::Urgent,
            Some("high") => Urgency::High,
            _ => Urgency::Normal,
        }
    }

    pub fn vibration(self) -> Vec<u32> {
        match self {
            Urgency::Urgent => URGENT_VIBRATION.to_vec(),
            _ => NORMAL_VIBRATION.to_vec(),
        }
    }

    pub fn requires_interaction(self) -> bool {
        matches!(self, Urgency::Urgent | Urgency::High)
    }
}

/// A button on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NotificationAction {
    fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
            icon: None,
        }
    }

    /// View and dismiss
    pub fn defaults() -> Vec<Self> {
        vec![Self::new("view", "Bekyk"), Self::new("dismiss", "Sluit")]
    }
}

/// A notification the worker asks the platform to display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub data: Value,
    pub vibrate: Vec<u32>,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    #[serde(skip)]
    pub urgency: Urgency,
}

impl NotificationIntent {
    /// Build a notification from a push payload.
    ///
    /// A JSON object is merged over the defaults. Any other JSON value
    /// contributes nothing, and bytes that are not JSON become the body.
    pub fn from_push(payload: Option<&[u8]>, defaults: &NotificationDefaults) -> Self {
        let mut fields = Map::new();
        let mut text_body = None;

        if let Some(bytes) = payload {
            match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(map)) => fields = map,
                Ok(_) => {}
                Err(_) => text_body = Some(String::from_utf8_lossy(bytes).into_owned()),
            }
        }

        let urgency = Urgency::from_priority(fields.get("priority").and_then(Value::as_str));

        let mut tag = string_field(&fields, "tag").unwrap_or_else(|| defaults.tag.clone());
        if urgency == Urgency::Urgent {
            tag = format!("urgent-{}", tag);
        }

        let data = fields
            .get("data")
            .filter(|d| !is_falsy(d))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "url": defaults.url }));

        let actions = match fields.get("actions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| NotificationAction::deserialize(item).ok())
                .collect(),
            _ => NotificationAction::defaults(),
        };

        Self {
            title: string_field(&fields, "title").unwrap_or_else(|| defaults.title.clone()),
            body: text_body
                .or_else(|| string_field(&fields, "body"))
                .unwrap_or_else(|| defaults.body.clone()),
            icon: string_field(&fields, "icon").unwrap_or_else(|| defaults.icon.clone()),
            badge: string_field(&fields, "badge").unwrap_or_else(|| defaults.badge.clone()),
            tag,
            data,
            vibrate: urgency.vibration(),
            require_interaction: urgency.requires_interaction(),
            actions,
            urgency,
        }
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// In-app route a notification click leads to; `None` for dismiss
pub fn click_target(action: &str, data: &Value) -> Option<String> {
    match action {
        "dismiss" => None,
        "respond" => Some("/krisis".to_string()),
        "rsvp" => Some("/program".to_string()),
        "contact" => Some("/pastorale-aksie".to_string()),
        _ => Some(
            data.get("url")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .unwrap_or("/")
                .to_string(),
        ),
    }
}

/// Identifier carried in a notification's data, or null
pub fn dismissed_id(data: &Value) -> Value {
    data.get("id")
        .filter(|id| !is_falsy(id))
        .cloned()
        .unwrap_or(Value::Null)
}

/// What a notification click ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Dismissed,
    /// An existing window was told about the click and focused
    Focused { client: ClientId, url: String },
    /// No suitable window was open; a new one was opened
    Opened { client: ClientId, url: String },
}
