//! Foreground clients
//!
//! Every open window (or dedicated worker) the background worker can talk
//! to. Each client owns the receiving half of an unbounded channel; the
//! worker keeps the sender.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use super::messages::WorkerEvent;

pub type ClientId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Window,
    Worker,
}

/// Snapshot of a client's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    pub kind: ClientKind,
    /// Whether the current worker generation controls this client
    pub controlled: bool,
    pub focused: bool,
}

struct Entry {
    info: ClientInfo,
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

/// Registry of foreground clients
#[derive(Default)]
pub struct Clients {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<ClientId, Entry>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ClientId, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a client; the receiver gets every message posted to it
    pub fn register(
        &self,
        url: &str,
        kind: ClientKind,
        controlled: bool,
    ) -> (ClientId, mpsc::UnboundedReceiver<WorkerEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let info = ClientInfo {
            id,
            url: url.to_string(),
            kind,
            controlled,
            focused: false,
        };
        self.lock().insert(id, Entry { info, tx });
        (id, rx)
    }

    #[cfg(test)]
    pub fn unregister(&self, id: ClientId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.lock().get(&id).map(|e| e.info.clone())
    }

    /// Clients in registration order, optionally filtered by kind
    pub fn match_all(&self, include_uncontrolled: bool, kind: Option<ClientKind>) -> Vec<ClientInfo> {
        self.lock()
            .values()
            .filter(|e| include_uncontrolled || e.info.controlled)
            .filter(|e| kind.is_none_or(|k| e.info.kind == k))
            .map(|e| e.info.clone())
            .collect()
    }

    /// Post to one client. Returns false when the client is gone or has
    /// dropped its receiver.
    pub fn post(&self, id: ClientId, event: WorkerEvent) -> bool {
        match self.lock().get(&id) {
            Some(entry) => entry.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Post to every controlled client; returns how many received it
    pub fn broadcast(&self, event: &WorkerEvent) -> usize {
        let entries = self.lock();
        let mut delivered = 0;
        for entry in entries.values().filter(|e| e.info.controlled) {
            if entry.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                log::debug!("Client {} has gone away, skipping", entry.info.id);
            }
        }
        delivered
    }

    /// Take control of every open client without a reload
    pub fn claim(&self) -> usize {
        let mut entries = self.lock();
        let mut claimed = 0;
        for entry in entries.values_mut().filter(|e| !e.info.controlled) {
            entry.info.controlled = true;
            claimed += 1;
        }
        claimed
    }

    /// Focus a window; every other window loses focus
    pub fn focus(&self, id: ClientId) -> bool {
        let mut entries = self.lock();
        if !entries.contains_key(&id) {
            return false;
        }
        for entry in entries.values_mut() {
            entry.info.focused = entry.info.id == id;
        }
        true
    }

    /// Open a new window at `url`. The window starts controlled and focused.
    pub fn open_window(&self, url: &str) -> (ClientId, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (id, rx) = self.register(url, ClientKind::Window, true);
        self.focus(id);
        (id, rx)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
