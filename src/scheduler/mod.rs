//! # Polling schedulers.
//!
//! The engine never waits for messages. Each listener is a [`Poll`](crate::Poll) handed to a
//! [`Scheduler`], which ticks it until the returned [`ListenerHandle`] is cancelled.
//!
//! - [`IntervalScheduler`] one tokio task per poll, base interval stretched by idle backoff
//! - [`ManualScheduler`] ticks only when asked; deterministic driver for tests and embedding

mod interval;
mod manual;
mod poll_loop;

pub use interval::IntervalScheduler;
pub use manual::ManualScheduler;

use crate::channel::ListenerHandle;
use crate::error::ScheduleError;
use crate::polls::PollRef;

/// Registers and cancels periodic polls.
pub trait Scheduler: Send + Sync + 'static {
    /// Starts ticking `poll`; the returned handle identifies it for [`cancel_polling`](Self::cancel_polling).
    fn schedule_polling(&self, poll: PollRef) -> Result<ListenerHandle, ScheduleError>;

    /// Stops ticking the poll. Returns false if the handle is unknown.
    ///
    /// A tick already in flight runs to completion.
    fn cancel_polling(&self, handle: &ListenerHandle) -> bool;

    /// Stops accepting polls and cancels every remaining one.
    fn close(&self) {}
}
