//! # Listener registry: which channels this process listens on.
//!
//! Process-local, never shared. Guards the one-listener-per-channel rule before any shared
//! state is touched:
//!
//! ```text
//! create_listener ─► reserve(key) ──► Pending ──► activate(key, handle) ──► Active
//!                        │ (entry exists)            │
//!                        └─► DuplicateListener       └─ failure ─► release(key)
//!
//! remove_listener ─► handle(key) ──► Active? ──► ... ──► take(key)
//! ```
//!
//! ## Rules
//! - An entry exists from `reserve` until `release` / `take`; two concurrent
//!   `create_listener` calls for one channel cannot both pass `reserve`.
//! - Only `Active` entries are visible to `handle` / `list`.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::channel::{ChannelKey, ListenerHandle, WorkerId};
use crate::error::ChannelError;

enum Registration {
    Pending { worker: WorkerId },
    Active { worker: WorkerId, handle: ListenerHandle },
}

impl Registration {
    fn active(&self) -> Option<(WorkerId, ListenerHandle)> {
        match self {
            Registration::Active { worker, handle } => Some((worker.clone(), *handle)),
            Registration::Pending { .. } => None,
        }
    }
}

/// Registry of this process's listeners, keyed by channel.
pub(crate) struct ListenerRegistry {
    entries: RwLock<HashMap<ChannelKey, Registration>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Claims `key` for a listener being created.
    pub async fn reserve(&self, key: &ChannelKey, worker: &WorkerId) -> Result<(), ChannelError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Err(ChannelError::DuplicateListener {
                channel: key.to_string(),
            });
        }
        entries.insert(
            key.clone(),
            Registration::Pending {
                worker: worker.clone(),
            },
        );
        Ok(())
    }

    /// Completes a reservation.
    pub async fn activate(&self, key: &ChannelKey, handle: ListenerHandle) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            let worker = match entry {
                Registration::Pending { worker } | Registration::Active { worker, .. } => {
                    worker.clone()
                }
            };
            *entry = Registration::Active { worker, handle };
        }
    }

    /// Drops a reservation that never became active.
    pub async fn release(&self, key: &ChannelKey) {
        let mut entries = self.entries.write().await;
        if matches!(entries.get(key), Some(Registration::Pending { .. })) {
            entries.remove(key);
        }
    }

    /// Worker and handle of the active listener on `key`.
    pub async fn handle(&self, key: &ChannelKey) -> Option<(WorkerId, ListenerHandle)> {
        self.entries.read().await.get(key).and_then(Registration::active)
    }

    /// Removes the entry for `key` if it is still `handle`.
    pub async fn take(&self, key: &ChannelKey, handle: &ListenerHandle) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(key).and_then(Registration::active) {
            Some((_, h)) if h == *handle => entries.remove(key).is_some(),
            _ => false,
        }
    }

    /// Active listeners, sorted by channel key.
    pub async fn list(&self) -> Vec<(ChannelKey, WorkerId, ListenerHandle)> {
        let entries = self.entries.read().await;
        let mut out: Vec<_> = entries
            .iter()
            .filter_map(|(k, r)| r.active().map(|(w, h)| (k.clone(), w, h)))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
