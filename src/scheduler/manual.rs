//! # ManualScheduler: ticks on demand.
//!
//! Registered polls never run by themselves; the owner calls [`ManualScheduler::tick`] or
//! [`ManualScheduler::tick_all`]. Useful in tests and when an embedding application already
//! owns a timer loop.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::Scheduler;
use crate::channel::ListenerHandle;
use crate::error::{ChannelError, ScheduleError};
use crate::polls::{PollOutcome, PollRef};

/// Scheduler driven by explicit ticks.
#[derive(Default)]
pub struct ManualScheduler {
    polls: Mutex<BTreeMap<ListenerHandle, PollRef>>,
    reject: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl ManualScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `schedule_polling` call fail with [`ScheduleError::Rejected`].
    pub fn reject_next(&self, reason: impl Into<String>) {
        if let Ok(mut reject) = self.reject.lock() {
            *reject = Some(reason.into());
        }
    }

    /// Runs one tick of the poll behind `handle`; `None` if it is not scheduled.
    pub async fn tick(&self, handle: &ListenerHandle) -> Option<Result<PollOutcome, ChannelError>> {
        let poll = self.polls.lock().ok()?.get(handle).cloned()?;
        Some(poll.tick().await)
    }

    /// Ticks every scheduled poll once, in handle order.
    pub async fn tick_all(&self) -> Vec<(ListenerHandle, Result<PollOutcome, ChannelError>)> {
        let polls: Vec<(ListenerHandle, PollRef)> = match self.polls.lock() {
            Ok(polls) => polls.iter().map(|(h, p)| (*h, p.clone())).collect(),
            Err(_) => Vec::new(),
        };
        let mut results = Vec::with_capacity(polls.len());
        for (handle, poll) in polls {
            results.push((handle, poll.tick().await));
        }
        results
    }

    /// Handles of the scheduled polls, in order.
    pub fn handles(&self) -> Vec<ListenerHandle> {
        self.polls
            .lock()
            .map(|p| p.keys().copied().collect())
            .unwrap_or_default()
    }

    /// True if `handle` is scheduled.
    pub fn is_scheduled(&self, handle: &ListenerHandle) -> bool {
        self.polls.lock().is_ok_and(|p| p.contains_key(handle))
    }

    /// Number of scheduled polls.
    pub fn len(&self) -> usize {
        self.polls.lock().map_or(0, |p| p.len())
    }

    /// True when no poll is scheduled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_polling(&self, poll: PollRef) -> Result<ListenerHandle, ScheduleError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ScheduleError::Closed);
        }
        if let Some(reason) = self.reject.lock().ok().and_then(|mut r| r.take()) {
            return Err(ScheduleError::Rejected { reason });
        }
        let handle = ListenerHandle::next();
        self.polls
            .lock()
            .map_err(|_| ScheduleError::Rejected {
                reason: "scheduler state poisoned".to_string(),
            })?
            .insert(handle, poll);
        Ok(handle)
    }

    fn cancel_polling(&self, handle: &ListenerHandle) -> bool {
        self.polls
            .lock()
            .is_ok_and(|mut p| p.remove(handle).is_some())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut polls) = self.polls.lock() {
            polls.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::PollFn;

    fn idle() -> PollRef {
        PollFn::arc("idle", || async { Ok::<_, ChannelError>(PollOutcome::Idle) })
    }

    #[tokio::test]
    async fn ticks_only_scheduled_polls() {
        let sched = ManualScheduler::new();
        let h = sched.schedule_polling(idle()).unwrap();
        assert_eq!(sched.tick(&h).await, Some(Ok(PollOutcome::Idle)));

        assert!(sched.cancel_polling(&h));
        assert_eq!(sched.tick(&h).await, None);
        assert!(!sched.cancel_polling(&h));
    }

    #[tokio::test]
    async fn reject_next_fails_once() {
        let sched = ManualScheduler::new();
        sched.reject_next("full");
        assert_eq!(
            sched.schedule_polling(idle()).unwrap_err(),
            ScheduleError::Rejected {
                reason: "full".into()
            }
        );
        assert!(sched.schedule_polling(idle()).is_ok());
        assert_eq!(sched.len(), 1);
    }

    #[tokio::test]
    async fn close_clears_and_refuses() {
        let sched = ManualScheduler::new();
        sched.schedule_polling(idle()).unwrap();
        sched.close();
        assert!(sched.is_empty());
        assert_eq!(
            sched.schedule_polling(idle()).unwrap_err(),
            ScheduleError::Closed
        );
        assert!(sched.tick_all().await.is_empty());
    }
}
