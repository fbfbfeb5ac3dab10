//! # LogWriter: engine events as `tracing` records.
//!
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  published channel="slotbus:channel:jobs" slots=2
//! INFO  listener created channel="slotbus:channel:jobs" worker="1" handle="4242#1" migrated=3
//! DEBUG delivered channel="slotbus:channel:jobs" worker="1" remaining=0
//! WARN  listener failed channel="slotbus:channel:jobs" worker="1" reason="db down"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber writing every event through `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let channel = e.channel.as_deref().unwrap_or("-");
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let handle = e.handle.map(|h| h.to_string()).unwrap_or_default();

        match e.kind {
            EventKind::MessagePublished => {
                info!(seq = e.seq, channel, slots = e.count, "published");
            }
            EventKind::DefaultBuffered => {
                info!(seq = e.seq, channel, "buffered in default bucket");
            }
            EventKind::MessageDropped => {
                info!(seq = e.seq, channel, "dropped, no listener and store disabled");
            }
            EventKind::MessageDelivered => {
                debug!(seq = e.seq, channel, worker, remaining = e.count, "delivered");
            }
            EventKind::ListenerCreated => {
                info!(seq = e.seq, channel, worker, handle = %handle, migrated = e.count, "listener created");
            }
            EventKind::DefaultMigrated => {
                info!(seq = e.seq, channel, worker, messages = e.count, "default bucket migrated");
            }
            EventKind::ListenerRejected => {
                warn!(seq = e.seq, channel, worker, reason, "listener rejected");
            }
            EventKind::ListenerRemoved => {
                info!(seq = e.seq, channel, worker, handle = %handle, queued = e.count, reason, "listener removed");
            }
            EventKind::ListenerFailed => {
                warn!(seq = e.seq, channel, worker, reason, "listener failed");
            }
            EventKind::TickFailed => {
                warn!(seq = e.seq, poll = e.task.as_deref(), handle = %handle, reason, "tick failed");
            }
            EventKind::PollBackoff => {
                debug!(seq = e.seq, poll = e.task.as_deref(), delay_ms = e.delay_ms, streak = e.count, "poll backoff");
            }
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = e.task.as_deref(), reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(seq = e.seq, subscriber = e.task.as_deref(), reason, "subscriber panicked");
            }
            EventKind::ShutdownRequested => {
                info!(seq = e.seq, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!(seq = e.seq, "all listeners detached within grace");
            }
            EventKind::GraceExceeded => {
                warn!(seq = e.seq, "grace exceeded");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
