//! # Channel keys, worker ids and slot ids.
//!
//! - [`ChannelKey`] namespaced store key of a channel (`<namespace><user key>`).
//! - [`WorkerId`] caller-supplied worker identity (integer or string).
//! - [`SlotId`] key of a slot inside a channel state: a worker's textual id or the default bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Namespace prepended to user keys unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "slotbus:channel:";

/// Reserved slot buffering messages published before any listener exists.
pub const DEFAULT_SLOT: &str = "--default--";

/// Store key of a channel.
///
/// ## Example
/// ```rust
/// use slotbus::ChannelKey;
///
/// let key = ChannelKey::resolve("app:", "jobs");
/// assert_eq!(key.as_str(), "app:jobs");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Prefixes `user_key` with `namespace`. Pure and deterministic.
    pub fn resolve(namespace: &str, user_key: &str) -> Self {
        let mut key = String::with_capacity(namespace.len() + user_key.len());
        key.push_str(namespace);
        key.push_str(user_key);
        Self(key)
    }

    /// Returns the full store key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a worker process.
///
/// Integer and string ids with the same text (`7` and `"7"`) address the same slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerId {
    /// Numeric worker index.
    Index(u64),
    /// Named worker.
    Name(String),
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::Index(n) => write!(f, "{n}"),
            WorkerId::Name(s) => f.write_str(s),
        }
    }
}

impl From<u64> for WorkerId {
    fn from(n: u64) -> Self {
        WorkerId::Index(n)
    }
}

impl From<u32> for WorkerId {
    fn from(n: u32) -> Self {
        WorkerId::Index(u64::from(n))
    }
}

impl From<usize> for WorkerId {
    fn from(n: usize) -> Self {
        WorkerId::Index(n as u64)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        WorkerId::Name(s.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        WorkerId::Name(s)
    }
}

/// Key of a slot inside a [`ChannelState`](crate::ChannelState).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// The default bucket.
    pub fn default_bucket() -> Self {
        Self(DEFAULT_SLOT.to_string())
    }

    /// Slot of a worker; fails if the worker's text is the reserved default id.
    pub fn worker(worker: &WorkerId) -> Result<Self, ChannelError> {
        let text = worker.to_string();
        if text == DEFAULT_SLOT {
            return Err(ChannelError::InvalidWorker { worker: text });
        }
        Ok(Self(text))
    }

    /// Returns true for the default bucket.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SLOT
    }

    /// Returns the textual slot id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_concatenates() {
        let key = ChannelKey::resolve(DEFAULT_NAMESPACE, "orders");
        assert_eq!(key.as_str(), "slotbus:channel:orders");
        assert_eq!(key, ChannelKey::resolve(DEFAULT_NAMESPACE, "orders"));
    }

    #[test]
    fn numeric_and_textual_workers_share_a_slot() {
        let a = SlotId::worker(&WorkerId::from(7u64)).unwrap();
        let b = SlotId::worker(&WorkerId::from("7")).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_default());
    }

    #[test]
    fn default_sentinel_is_not_a_worker() {
        let err = SlotId::worker(&WorkerId::from(DEFAULT_SLOT)).unwrap_err();
        assert_eq!(err.as_label(), "channel_invalid_worker");
        assert!(SlotId::default_bucket().is_default());
    }
}
