//! Engine core: channel operations, dispatch and lifecycle.
//!
//! The public API from this module is [`ChannelEngine`] (built via [`EngineBuilder`]),
//! its [`Config`] and [`PublishOptions`].
//!
//! Internal modules:
//! - [`engine`]: publish, listener lifecycle, shutdown;
//! - [`dispatch`]: the per-listener poll popping one message per tick;
//! - [`registry`]: process-local listener registry;
//! - [`shutdown`]: OS signal handling;
//! - [`builder`]: wiring of store, scheduler, bus and subscribers.

mod builder;
mod config;
mod dispatch;
mod engine;
mod registry;
mod shutdown;

pub use builder::EngineBuilder;
pub use config::{Config, DispatchMode};
pub use engine::{ChannelEngine, PublishOptions};
