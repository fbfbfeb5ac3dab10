//! # Typed access to channel states in a shared store.
//!
//! [`ChannelStore`] encodes and decodes [`ChannelState`] values; locking is left to the
//! caller (see [`atomic_execute`](crate::atomic_execute)).

use std::sync::Arc;

use crate::channel::{ChannelKey, ChannelState};
use crate::error::ChannelError;
use crate::store::SharedStore;

/// Channel state reader/writer over a [`SharedStore`]. Cheap to clone.
#[derive(Clone)]
pub struct ChannelStore {
    store: Arc<dyn SharedStore>,
}

impl ChannelStore {
    /// Wraps a shared store.
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// The underlying store (used for locking).
    pub fn shared(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Reads a channel; an absent key reads as an empty state.
    pub async fn read(&self, key: &ChannelKey) -> Result<ChannelState, ChannelError> {
        match self.store.get(key.as_str()).await? {
            None => Ok(ChannelState::new()),
            Some(raw) => serde_json::from_value(raw).map_err(|e| ChannelError::Corrupt {
                key: key.to_string(),
                error: e.to_string(),
            }),
        }
    }

    /// Replaces a channel's stored state.
    pub async fn write(&self, key: &ChannelKey, state: &ChannelState) -> Result<(), ChannelError> {
        let raw = serde_json::to_value(state).map_err(|e| ChannelError::Corrupt {
            key: key.to_string(),
            error: e.to_string(),
        })?;
        self.store.set(key.as_str(), raw).await?;
        Ok(())
    }
}
