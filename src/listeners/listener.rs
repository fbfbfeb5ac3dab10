//! # Listener callbacks.
//!
//! A [`Listener`] receives the messages popped for its (channel, worker) slot, one per
//! dispatch tick. With the default [`DispatchMode::InLock`](crate::DispatchMode) it runs while
//! the channel lock is held: it must be fast, must not call back into the same channel, and
//! its latency counts against the lock fuse.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::channel::{ChannelKey, WorkerId};

/// Shared handle to a listener.
pub type ListenerRef = Arc<dyn Listener>;

/// A message handed to a listener.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    /// Channel the message was published on.
    pub channel: ChannelKey,
    /// Worker slot it was popped from.
    pub worker: WorkerId,
    /// The message itself.
    pub message: Value,
}

/// Error returned by a listener. The message it was handling is not redelivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct ListenerError {
    /// The underlying error message.
    pub error: String,
}

impl ListenerError {
    /// Creates an error from any message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl From<String> for ListenerError {
    fn from(error: String) -> Self {
        Self { error }
    }
}

impl From<&str> for ListenerError {
    fn from(error: &str) -> Self {
        Self::new(error)
    }
}

/// # Message consumer attached to a channel slot.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use slotbus::{Delivery, Listener, ListenerError};
///
/// struct Printer;
///
/// #[async_trait]
/// impl Listener for Printer {
///     async fn on_message(&self, d: &Delivery) -> Result<(), ListenerError> {
///         println!("{} -> {}: {}", d.channel, d.worker, d.message);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handles one delivered message.
    async fn on_message(&self, delivery: &Delivery) -> Result<(), ListenerError>;

    /// Name used for the listener's polling task. Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
