//! Engine events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ChannelEngine` operations, `Dispatcher` ticks, the interval scheduler's
//!   poll loops, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the engine's subscriber listener (fans out to `SubscriberSet`) and any
//!   receiver obtained from `ChannelEngine::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
