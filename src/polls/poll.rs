//! # Poll abstraction.
//!
//! A [`Poll`] is invoked once per scheduler tick. It must do a bounded amount of work and
//! return; waiting for work is the scheduler's job, never the poll's.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Shared handle to a poll.
pub type PollRef = Arc<dyn Poll>;

/// Result of a successful tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Work was done; tick again at the base interval.
    Busy,
    /// Nothing to do; the scheduler may stretch the interval.
    Idle,
}

/// # Periodically ticked unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use slotbus::{ChannelError, Poll, PollOutcome};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Poll for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn tick(&self) -> Result<PollOutcome, ChannelError> {
///         Ok(PollOutcome::Idle)
///     }
/// }
/// ```
#[async_trait]
pub trait Poll: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Performs one tick.
    async fn tick(&self) -> Result<PollOutcome, ChannelError>;
}
