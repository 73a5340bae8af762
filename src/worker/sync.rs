//! Background sync triggers
//!
//! The platform fires sync events when connectivity returns. The worker does
//! no reconciliation of its own: each known tag becomes one broadcast asking
//! the foreground to push its queued work.

use super::messages::WorkerEvent;

pub const SYNC_PASTORAL_ACTIONS: &str = "sync-pastoral-actions";
pub const SYNC_CRISIS_REPORTS: &str = "sync-crisis-reports";
pub const SYNC_ALL: &str = "sync-all";

/// Tag of the periodic sync registration
pub const PERIODIC_SYNC_TAG: &str = "sync-offline-data";

/// Event to broadcast for a one-off sync tag
pub fn sync_event(tag: &str) -> Option<WorkerEvent> {
    match tag {
        SYNC_PASTORAL_ACTIONS => Some(WorkerEvent::SyncPastoralActions),
        SYNC_CRISIS_REPORTS => Some(WorkerEvent::SyncCrisisReports),
        SYNC_ALL => Some(WorkerEvent::SyncAll),
        _ => None,
    }
}

/// Event to broadcast for a periodic sync tag
pub fn periodic_sync_event(tag: &str) -> Option<WorkerEvent> {
    (tag == PERIODIC_SYNC_TAG).then_some(WorkerEvent::PeriodicSync)
}
