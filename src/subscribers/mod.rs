//! # Event subscribers.
//!
//! ```text
//! engine / dispatchers / scheduler ── publish(Event) ──► Bus ──► SubscriberSet
//!                                                                  ├──► LogWriter (tracing)
//!                                                                  ├──► metrics
//!                                                                  └──► ...
//! ```
//!
//! - [`Subscribe`] extension point for custom handlers
//! - [`SubscriberSet`] bounded per-subscriber queues with panic isolation
//! - `LogWriter` (feature `logging`) writes events as `tracing` records

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_message;
