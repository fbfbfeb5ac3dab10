//! # IntervalScheduler: one tokio task per poll.
//!
//! ```text
//! schedule_polling(poll)
//!   ├─► closed?            → ScheduleError::Closed
//!   ├─► no tokio runtime?  → ScheduleError::Rejected
//!   ├─► handle = ListenerHandle::next()
//!   ├─► token  = runtime_token.child_token()
//!   └─► spawn poll_loop(poll, handle, cadence, bus, token)  → polls[handle]
//!
//! cancel_polling(handle) → polls.remove(handle).cancel()     (not joined)
//! close()                → closed = true, runtime_token.cancel(), polls.clear()
//! ```
//!
//! ## Rules
//! - Cancellation is never joined: `cancel_polling` may be called from inside a critical
//!   section the poll's own tick is waiting on.
//! - Every loop owns a child of the scheduler's token, so `close()` stops all of them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::Scheduler;
use super::poll_loop::{Cadence, poll_loop};
use crate::channel::ListenerHandle;
use crate::error::ScheduleError;
use crate::events::Bus;
use crate::policies::BackoffPolicy;
use crate::polls::PollRef;

/// Tokio-backed periodic scheduler.
///
/// Ticks every poll at `interval` while it reports work, and stretches the delay per
/// `idle` while it stays idle or keeps failing.
pub struct IntervalScheduler {
    cadence: Cadence,
    bus: Option<Bus>,
    polls: Mutex<HashMap<ListenerHandle, CancellationToken>>,
    runtime_token: CancellationToken,
    closed: AtomicBool,
}

impl IntervalScheduler {
    /// Creates a scheduler with the given base interval and idle backoff.
    pub fn new(interval: Duration, idle: BackoffPolicy) -> Self {
        Self {
            cadence: Cadence { interval, idle },
            bus: None,
            polls: Mutex::new(HashMap::new()),
            runtime_token: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Publishes `TickFailed` / `PollBackoff` on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Number of polls currently scheduled.
    pub fn len(&self) -> usize {
        self.polls.lock().map_or(0, |p| p.len())
    }

    /// True when no poll is scheduled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Scheduler for IntervalScheduler {
    fn schedule_polling(&self, poll: PollRef) -> Result<ListenerHandle, ScheduleError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ScheduleError::Closed);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| ScheduleError::Rejected {
            reason: e.to_string(),
        })?;
        let mut polls = self.polls.lock().map_err(|_| ScheduleError::Rejected {
            reason: "scheduler state poisoned".to_string(),
        })?;

        let handle = ListenerHandle::next();
        let cancel = self.runtime_token.child_token();
        runtime.spawn(poll_loop(
            poll,
            handle,
            self.cadence,
            self.bus.clone(),
            cancel.clone(),
        ));
        polls.insert(handle, cancel);
        Ok(handle)
    }

    fn cancel_polling(&self, handle: &ListenerHandle) -> bool {
        let removed = match self.polls.lock() {
            Ok(mut polls) => polls.remove(handle),
            Err(_) => None,
        };
        match removed {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.runtime_token.cancel();
        if let Ok(mut polls) = self.polls.lock() {
            polls.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::polls::{PollFn, PollOutcome};
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use tokio::time;

    fn counting(ticks: &Arc<AtomicU32>) -> PollRef {
        let t = Arc::clone(ticks);
        PollFn::arc("count", move || {
            let t = Arc::clone(&t);
            async move {
                t.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ChannelError>(PollOutcome::Busy)
            }
        })
    }

    fn scheduler() -> IntervalScheduler {
        IntervalScheduler::new(
            Duration::from_millis(100),
            BackoffPolicy::constant(Duration::from_millis(100)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let sched = scheduler();
        let ticks = Arc::new(AtomicU32::new(0));
        let handle = sched.schedule_polling(counting(&ticks)).unwrap();
        assert_eq!(sched.len(), 1);

        time::sleep(Duration::from_millis(250)).await;
        assert!(sched.cancel_polling(&handle));
        assert!(!sched.cancel_polling(&handle));
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert!(sched.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_all_and_refuses_new_polls() {
        let sched = scheduler();
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        sched.schedule_polling(counting(&a)).unwrap();
        sched.schedule_polling(counting(&b)).unwrap();

        time::sleep(Duration::from_millis(50)).await;
        sched.close();
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(
            sched.schedule_polling(counting(&a)).unwrap_err(),
            ScheduleError::Closed
        );
    }

    #[test]
    fn outside_a_runtime_is_rejected() {
        let sched = scheduler();
        let err = sched
            .schedule_polling(counting(&Arc::new(AtomicU32::new(0))))
            .unwrap_err();
        assert_eq!(err.as_label(), "schedule_rejected");
    }
}
