//! Worker event display model

use colored::Colorize;
use serde_json::Value;

use crate::worker::messages::WorkerEvent;

/// A worker event as shown in pretty output
pub struct EventDisplay<'a>(pub &'a WorkerEvent);

impl std::fmt::Display for EventDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let payload = serde_json::to_value(self.0)
            .ok()
            .and_then(|mut v| v.get_mut("payload").map(Value::take));

        match payload {
            Some(payload) => write!(f, "{} {} {}", "→".cyan(), self.0.kind().bold(), payload),
            None => write!(f, "{} {}", "→".cyan(), self.0.kind().bold()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display_includes_type_and_payload() {
        colored::control::set_override(false);
        let event = WorkerEvent::CachesCleared { success: true };
        assert_eq!(
            EventDisplay(&event).to_string(),
            r#"→ CACHES_CLEARED {"success":true}"#
        );
        assert_eq!(EventDisplay(&WorkerEvent::SyncAll).to_string(), "→ SYNC_ALL");
    }
}
