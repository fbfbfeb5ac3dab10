//! # slotbus
//!
//! **slotbus** provides publish/subscribe channels shared by the independent worker
//! processes of one server. Channel state lives in a shared key/value store; each process
//! attaches at most one listener per channel, and listeners drain their own per-worker
//! queue one message per scheduler tick. Nothing ever blocks waiting for messages.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   process A                                   process B
//! ┌───────────────────────────────┐           ┌───────────────────────────────┐
//! │ ChannelEngine                 │           │ ChannelEngine                 │
//! │  - ListenerRegistry (local)   │           │  - ListenerRegistry (local)   │
//! │  - Bus ──► SubscriberSet      │           │  - Bus ──► SubscriberSet      │
//! │  - Scheduler ──► Dispatcher*  │           │  - Scheduler ──► Dispatcher*  │
//! └──────────────┬────────────────┘           └──────────────┬────────────────┘
//!                │  atomic_execute(channel key, lock wait, fuse)   │
//!                ▼                                                 ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │ SharedStore                                                               │
//! │   "slotbus:channel:jobs" → { "--default--": {queue},                      │
//! │                              "1": {listener, queue}, "2": {queue}, ... }  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Message lifecycle
//! ```text
//! publish("jobs", m)
//!   ├─ no slots         ─► "--default--" queue (store = true) or dropped
//!   └─ slots            ─► every slot with a listener (and every other slot if store = true)
//!
//! create_listener("jobs", worker, listener)
//!   └─► slot[worker].listener = handle; "--default--" queue prepended to every slot
//!
//! Dispatcher tick (per listener, per scheduler interval)
//!   └─► lock { pop slot[worker] head ─► listener.on_message(m) ─► persist }
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                           |
//! |-------------------|-----------------------------------------------------------|----------------------------------------------|
//! | **Engine**        | Publish, listener lifecycle, shutdown.                    | [`ChannelEngine`], [`PublishOptions`]        |
//! | **Listeners**     | Message consumers attached to a worker slot.              | [`Listener`], [`ListenerFn`], [`Delivery`]   |
//! | **Shared store**  | Key/value access and cross-process named locks.           | [`SharedStore`], [`atomic_execute`]          |
//! | **Scheduling**    | Periodic polling of dispatchers.                          | [`Scheduler`], [`IntervalScheduler`]         |
//! | **Subscriber API**| Engine events for logging and metrics.                    | [`Subscribe`], [`Event`]                     |
//! | **Errors**        | Typed errors with stable labels.                          | [`ChannelError`], [`RuntimeError`]           |
//! | **Configuration** | Namespace, poll pacing, lock bounds, dispatch mode.       | [`Config`], [`BackoffPolicy`]                |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (`tracing` records).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use slotbus::{ChannelEngine, Config, ListenerFn, ManualScheduler, PublishOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), slotbus::ChannelError> {
//!     let scheduler = Arc::new(ManualScheduler::new());
//!     let engine = ChannelEngine::builder(Config::default())
//!         .with_scheduler(scheduler.clone())
//!         .build();
//!
//!     engine.publish("jobs", "early", PublishOptions::new()).await?;
//!
//!     let handle = engine
//!         .create_listener("jobs", 1u64, ListenerFn::arc("print", |d| {
//!             println!("worker {} got {}", d.worker, d.message);
//!             Ok(())
//!         }))
//!         .await?;
//!
//!     // Delivers "early", buffered before the listener existed.
//!     scheduler.tick(&handle).await;
//!
//!     engine.shutdown().await
//! }
//! ```

mod channel;
mod core;
mod error;
mod events;
mod listeners;
mod policies;
mod polls;
mod scheduler;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use channel::{
    ChannelKey, ChannelState, ChannelStore, DEFAULT_NAMESPACE, DEFAULT_SLOT, Fanout,
    ListenerHandle, SlotId, SlotState, WorkerId,
};
pub use core::{ChannelEngine, Config, DispatchMode, EngineBuilder, PublishOptions};
pub use error::{ChannelError, RuntimeError, ScheduleError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use listeners::{Delivery, Listener, ListenerError, ListenerFn, ListenerRef};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use polls::{Poll, PollFn, PollOutcome, PollRef};
pub use scheduler::{IntervalScheduler, ManualScheduler, Scheduler};
pub use store::{LockLease, LockLimits, LockMode, MemoryStore, SharedStore, atomic_execute};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
