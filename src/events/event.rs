//! # Engine events.
//!
//! [`EventKind`] classifies what happened:
//! - **Traffic**: messages published, buffered, dropped, delivered
//! - **Listener lifecycle**: created, rejected, removed, failed
//! - **Polling**: tick failures and backoff
//! - **Runtime**: subscriber health and shutdown
//!
//! [`Event`] carries the metadata (channel, worker, counts, reasons).
//! Every event gets a process-wide, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use slotbus::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::MessagePublished)
//!     .with_channel("slotbus:channel:jobs")
//!     .with_count(3);
//!
//! assert_eq!(ev.kind, EventKind::MessagePublished);
//! assert_eq!(ev.channel.as_deref(), Some("slotbus:channel:jobs"));
//! assert_eq!(ev.count, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::channel::ListenerHandle;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Traffic ===
    /// A publish completed.
    ///
    /// Sets `channel`, `count` (worker slots the message was appended to),
    /// `worker` (when the publisher passed one).
    MessagePublished,

    /// A publish found no listener and buffered the message in the default bucket.
    ///
    /// Sets `channel`.
    DefaultBuffered,

    /// A publish reached nobody (`store = false`, no listeners).
    ///
    /// Sets `channel`.
    MessageDropped,

    /// A dispatch tick handed a message to its listener.
    ///
    /// Sets `channel`, `worker`, `count` (messages still queued for the slot).
    MessageDelivered,

    // === Listener lifecycle ===
    /// A listener was attached.
    ///
    /// Sets `channel`, `worker`, `handle`, `count` (messages migrated from the default bucket).
    ListenerCreated,

    /// Buffered default-bucket messages moved to worker slots.
    ///
    /// Sets `channel`, `worker`, `count`.
    DefaultMigrated,

    /// A listener could not be attached (duplicate, scheduler refusal, lock failure).
    ///
    /// Sets `channel`, `worker`, `reason`.
    ListenerRejected,

    /// A listener was detached.
    ///
    /// Sets `channel`, `worker`, `handle`, `count` (messages left queued or purged),
    /// `reason` (`"purged"` or `"kept"`).
    ListenerRemoved,

    /// A listener returned an error or panicked; the popped message is lost.
    ///
    /// Sets `channel`, `worker`, `reason`.
    ListenerFailed,

    // === Polling ===
    /// A poll tick failed (lock timeout, fuse, store error, listener failure).
    ///
    /// Sets `task` (poll name), `handle`, `reason`.
    TickFailed,

    /// The poll loop stretched its interval.
    ///
    /// Sets `task`, `handle`, `delay_ms`, `count` (streak length).
    PollBackoff,

    // === Subscribers ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name), `reason`.
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Shutdown ===
    /// Shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    /// Every local listener was detached within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some listeners were still attached.
    GraceExceeded,
}

/// Engine event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Resolved channel key.
    pub channel: Option<Arc<str>>,
    /// Worker slot.
    pub worker: Option<Arc<str>>,
    /// Poll or subscriber name.
    pub task: Option<Arc<str>>,
    /// Listener handle involved.
    pub handle: Option<ListenerHandle>,
    /// Kind-specific count (fan-out, migrated, remaining, streak).
    pub count: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            channel: None,
            worker: None,
            task: None,
            handle: None,
            count: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a channel key.
    #[inline]
    pub fn with_channel(mut self, channel: impl Into<Arc<str>>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attaches a worker slot.
    #[inline]
    pub fn with_worker(mut self, worker: impl ToString) -> Self {
        self.worker = Some(worker.to_string().into());
        self
    }

    /// Attaches a poll or subscriber name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a listener handle.
    #[inline]
    pub fn with_handle(mut self, handle: ListenerHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Attaches a count (saturates at `u32::MAX`).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::ShutdownRequested);
        let b = Event::new(EventKind::ShutdownRequested);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn count_and_delay_saturate() {
        let ev = Event::new(EventKind::PollBackoff)
            .with_count(usize::MAX)
            .with_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.count, Some(u32::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
