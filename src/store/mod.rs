//! Shared key/value store and its cross-process lock.
//!
//! The engine never touches process memory for channel state: every read and write goes
//! through a [`SharedStore`], and every read-modify-write runs inside [`atomic_execute`].
//!
//! ## Contents
//! - [`SharedStore`] get/set plus lease-based named locks
//! - [`atomic_execute`] runs one critical section under a key's lock, bounded by wait and fuse
//! - [`MemoryStore`] in-process implementation (single process or tests)

mod atomic;
mod memory;

pub use atomic::{LockLimits, atomic_execute};
pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Lock mode for a critical section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Single holder.
    Exclusive,
    /// Any number of shared holders, no exclusive holder.
    Shared,
}

/// Proof of a held lock, returned by [`SharedStore::acquire`].
#[derive(Debug, PartialEq, Eq)]
pub struct LockLease {
    /// Locked key.
    pub key: String,
    /// Store-assigned lease id.
    pub id: u64,
    /// Mode the lease was granted in.
    pub mode: LockMode,
}

/// Shared state accessor.
///
/// Implementations must give mutual exclusion per key across every process that shares the
/// store, and must let a lease lapse once its holder has kept it longer than `fuse` so that a
/// crashed holder cannot deadlock the channel.
#[async_trait]
pub trait SharedStore: Send + Sync + 'static {
    /// Returns the stored value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the stored value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Acquires the named lock, waiting at most `wait`.
    ///
    /// Fails with [`StoreError::Timeout`] when the wait elapses.
    async fn acquire(
        &self,
        key: &str,
        mode: LockMode,
        wait: Duration,
        fuse: Duration,
    ) -> Result<LockLease, StoreError>;

    /// Releases a lease; [`StoreError::LeaseLost`] if it already lapsed and was taken over.
    async fn release(&self, lease: LockLease) -> Result<(), StoreError>;
}
