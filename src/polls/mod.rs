//! # Polling tasks.
//!
//! - [`Poll`] trait for a unit of work ticked repeatedly by a [`Scheduler`](crate::Scheduler)
//! - [`PollFn`] closure-backed implementation
//! - [`PollRef`] shared reference to a poll (`Arc<dyn Poll>`)
//! - [`PollOutcome`] what one tick achieved (drives idle backoff)

mod poll;
mod poll_fn;

pub use poll::{Poll, PollOutcome, PollRef};
pub use poll_fn::PollFn;
