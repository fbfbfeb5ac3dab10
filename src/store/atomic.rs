//! # Atomic execute: one critical section under a named lock.
//!
//! ```text
//! atomic_execute(store, key, mode, limits, section)
//!   ├─► store.acquire(key, mode, limits.wait, limits.fuse)
//!   │      └─ Timeout ─► ChannelError::LockTimeout
//!   ├─► time::timeout(limits.fuse, section())
//!   │      ├─ Ok(r)    ─► r                     (section result, success or failure)
//!   │      └─ Elapsed  ─► ChannelError::FuseBlown  (section future dropped)
//!   └─► store.release(lease)                    (always, also after fuse/failure)
//! ```
//!
//! ## Rules
//! - The section runs **at most once**; nothing is retried here.
//! - A section must not call `atomic_execute` for the same key (no nesting).
//! - Release failures are only surfaced when the section itself succeeded.
//! - Dropping the `atomic_execute` future (caller timeout, `select!`) still releases the
//!   lease: the guard hands the release to the runtime instead of leaving it to the fuse.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};

use super::{LockLease, LockMode, SharedStore};
use crate::error::{ChannelError, StoreError};

/// Wait and hold bounds of a critical section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockLimits {
    /// Maximum time to wait for the lock.
    pub wait: Duration,
    /// Maximum time to hold the lock.
    pub fuse: Duration,
}

impl Default for LockLimits {
    /// `wait = 5s`, `fuse = 60s`.
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(5),
            fuse: Duration::from_secs(60),
        }
    }
}

/// Held lease; released explicitly, or from a spawned task when dropped early.
struct LeaseGuard {
    store: Arc<dyn SharedStore>,
    lease: Option<LockLease>,
}

impl LeaseGuard {
    async fn release(mut self) -> Result<(), StoreError> {
        let Some(lease) = self.lease.as_ref().map(copy_lease) else {
            return Ok(());
        };
        let released = self.store.release(lease).await;
        self.lease = None;
        released
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %lease.key, lease = lease.id, "lease dropped outside a runtime, left to its fuse");
            return;
        };
        let store = Arc::clone(&self.store);
        runtime.spawn(async move {
            let (key, id) = (lease.key.clone(), lease.id);
            if let Err(e) = store.release(lease).await {
                debug!(%key, lease = id, error = %e, "deferred lease release failed");
            }
        });
    }
}

fn copy_lease(lease: &LockLease) -> LockLease {
    LockLease {
        key: lease.key.clone(),
        id: lease.id,
        mode: lease.mode,
    }
}

/// Runs `section` while holding the lock named `key`.
///
/// Returns the section's own result, [`ChannelError::LockTimeout`] when the lock was not
/// acquired within `limits.wait`, or [`ChannelError::FuseBlown`] when the section ran past
/// `limits.fuse` and was aborted.
///
/// The lease is released even if the returned future is dropped before completion.
pub async fn atomic_execute<T, F, Fut>(
    store: &Arc<dyn SharedStore>,
    key: &str,
    mode: LockMode,
    limits: LockLimits,
    section: F,
) -> Result<T, ChannelError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
{
    let lease = store
        .acquire(key, mode, limits.wait, limits.fuse)
        .await
        .map_err(|e| match e {
            StoreError::Timeout { waited } => ChannelError::LockTimeout {
                key: key.to_string(),
                waited,
            },
            other => ChannelError::Store(other),
        })?;

    let guard = LeaseGuard {
        store: Arc::clone(store),
        lease: Some(lease),
    };
    let outcome = time::timeout(limits.fuse, section()).await;
    let released = guard.release().await;

    match outcome {
        Err(_elapsed) => Err(ChannelError::FuseBlown {
            key: key.to_string(),
            fuse: limits.fuse,
        }),
        Ok(Err(e)) => Err(e),
        Ok(Ok(value)) => {
            released?;
            Ok(value)
        }
    }
}
