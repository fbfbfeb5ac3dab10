//! # In-process shared store.
//!
//! [`MemoryStore`] keeps values in a map and implements the named lock as a lease table:
//!
//! ```text
//! leases: HashMap<key, Holders>
//!   Holders { mode, leases: HashMap<lease_id, expires_at> }
//!
//! acquire(key, mode, wait, fuse):
//!   loop {
//!     ├─► drop holders whose expires_at <= now      (fuse lapsed, holder presumed dead)
//!     ├─► compatible? (no holders, or shared+shared) ─► grant lease(expires_at = now + fuse)
//!     └─► wait for a release or the next expiry, give up at now + wait ─► Timeout
//!   }
//! ```
//!
//! Every process that shares an instance (e.g. all tasks holding an `Arc<MemoryStore>`)
//! sees the same values and locks. It is the reference implementation used by tests and by
//! single-process deployments; a multi-process deployment plugs its own [`SharedStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, RwLock};
use tokio::time::{self, Instant};

use super::{LockLease, LockMode, SharedStore};
use crate::error::StoreError;

/// Current holders of one key.
struct Holders {
    mode: LockMode,
    leases: HashMap<u64, Instant>,
}

impl Holders {
    fn prune(&mut self, now: Instant) {
        self.leases.retain(|_, expires_at| *expires_at > now);
    }

    fn admits(&self, mode: LockMode) -> bool {
        self.leases.is_empty() || (self.mode == LockMode::Shared && mode == LockMode::Shared)
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.leases.values().min().copied()
    }
}

/// In-memory [`SharedStore`] with lease locks.
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
    leases: Mutex<HashMap<String, Holders>>,
    released: Notify,
    next_lease: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            leases: Mutex::new(HashMap::new()),
            released: Notify::new(),
            next_lease: AtomicU64::new(1),
        }
    }

    /// Returns sorted keys currently holding a value.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Holders>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grants a lease if compatible; otherwise reports when the blocking holders lapse.
    fn try_grant(&self, key: &str, mode: LockMode, fuse: Duration) -> Result<LockLease, Option<Instant>> {
        let now = Instant::now();
        let mut table = self.table();
        let holders = table.entry(key.to_string()).or_insert_with(|| Holders {
            mode,
            leases: HashMap::new(),
        });
        holders.prune(now);

        if !holders.admits(mode) {
            return Err(holders.next_expiry());
        }

        let id = self.next_lease.fetch_add(1, AtomicOrdering::Relaxed);
        holders.mode = mode;
        holders.leases.insert(id, now + fuse);
        Ok(LockLease {
            key: key.to_string(),
            id,
            mode,
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn acquire(
        &self,
        key: &str,
        mode: LockMode,
        wait: Duration,
        fuse: Duration,
    ) -> Result<LockLease, StoreError> {
        let deadline = Instant::now() + wait;

        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let lapse = match self.try_grant(key, mode, fuse) {
                Ok(lease) => return Ok(lease),
                Err(lapse) => lapse,
            };

            if Instant::now() >= deadline {
                return Err(StoreError::Timeout { waited: wait });
            }
            let wake = lapse.map_or(deadline, |at| at.min(deadline));

            tokio::select! {
                _ = &mut released => {}
                _ = time::sleep_until(wake) => {}
            }
        }
    }

    async fn release(&self, lease: LockLease) -> Result<(), StoreError> {
        let removed = {
            let mut table = self.table();
            let removed = table
                .get_mut(&lease.key)
                .is_some_and(|h| h.leases.remove(&lease.id).is_some());
            if table.get(&lease.key).is_some_and(|h| h.leases.is_empty()) {
                table.remove(&lease.key);
            }
            removed
        };
        self.released.notify_waiters();

        if removed {
            Ok(())
        } else {
            Err(StoreError::LeaseLost {
                key: lease.key,
                lease: lease.id,
            })
        }
    }
}
