//! # Poll loop: ticks one poll until cancelled.
//!
//! ```text
//! loop {
//!   ├─► cancelled? → break
//!   ├─► poll.tick()                 (never interrupted, so its lock lease is released)
//!   │     ├─ Ok(Busy)  → streak = 0, delay = interval
//!   │     ├─ Ok(Idle)  → delay = max(interval, idle.next(streak)), streak += 1
//!   │     ├─ Err(e)    → publish TickFailed, same as Idle
//!   │     └─ panic     → publish TickFailed, same as Idle
//!   ├─► delay grew past interval → publish PollBackoff
//!   └─► sleep(delay) or cancelled → break
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::channel::ListenerHandle;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::polls::{PollOutcome, PollRef};
use crate::subscribers::panic_message;

/// Timing parameters of a poll loop.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Cadence {
    pub interval: Duration,
    pub idle: BackoffPolicy,
}

pub(crate) async fn poll_loop(
    poll: PollRef,
    handle: ListenerHandle,
    cadence: Cadence,
    bus: Option<Bus>,
    token: CancellationToken,
) {
    let name = poll.name().to_string();
    tracing::debug!(poll = %name, handle = %handle, "poll loop started");

    let mut streak: u32 = 0;
    let mut prev_delay = cadence.interval;

    loop {
        if token.is_cancelled() {
            break;
        }

        let ticked = AssertUnwindSafe(poll.tick()).catch_unwind().await;
        let failure = match ticked {
            Ok(Ok(PollOutcome::Busy)) => {
                streak = 0;
                None
            }
            Ok(Ok(PollOutcome::Idle)) => Some(None),
            Ok(Err(e)) => Some(Some(e.to_string())),
            Err(payload) => Some(Some(format!("poll panicked: {}", panic_message(&*payload)))),
        };

        let delay = match failure {
            None => cadence.interval,
            Some(reason) => {
                if let (Some(bus), Some(reason)) = (&bus, reason) {
                    bus.publish(
                        Event::new(EventKind::TickFailed)
                            .with_task(name.as_str())
                            .with_handle(handle)
                            .with_reason(reason),
                    );
                }
                let delay = cadence.interval.max(cadence.idle.next(streak));
                streak = streak.saturating_add(1);
                delay
            }
        };

        if delay > cadence.interval && delay != prev_delay {
            if let Some(bus) = &bus {
                bus.publish(
                    Event::new(EventKind::PollBackoff)
                        .with_task(name.as_str())
                        .with_handle(handle)
                        .with_delay(delay)
                        .with_count(streak as usize),
                );
            }
        }
        prev_delay = delay;

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => {}
            _ = token.cancelled() => break,
        }
    }

    tracing::debug!(poll = %name, handle = %handle, "poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::polls::PollFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cadence() -> Cadence {
        Cadence {
            interval: Duration::from_millis(100),
            idle: BackoffPolicy {
                first: Duration::from_millis(100),
                max: Duration::from_millis(800),
                factor: 2.0,
                jitter: crate::policies::JitterPolicy::None,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn busy_poll_ticks_at_interval() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = Arc::clone(&ticks);
        let poll = PollFn::arc("busy", move || {
            let t = Arc::clone(&t);
            async move {
                t.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ChannelError>(PollOutcome::Busy)
            }
        });
        let token = CancellationToken::new();
        let join = tokio::spawn(poll_loop(poll, ListenerHandle::next(), cadence(), None, token.clone()));

        time::sleep(Duration::from_millis(450)).await;
        token.cancel();
        join.await.unwrap();
        // t = 0, 100, 200, 300, 400
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_poll_backs_off_and_reports() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = Arc::clone(&ticks);
        let poll = PollFn::arc("idle", move || {
            let t = Arc::clone(&t);
            async move {
                t.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ChannelError>(PollOutcome::Idle)
            }
        });
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let join = tokio::spawn(poll_loop(
            poll,
            ListenerHandle::next(),
            cadence(),
            Some(bus),
            token.clone(),
        ));

        // delays: 100, 200, 400, 800, 800 → ticks at 0, 100, 300, 700, 1500
        time::sleep(Duration::from_millis(1000)).await;
        token.cancel();
        join.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 4);

        let mut backoffs = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::PollBackoff {
                backoffs.push(ev.delay_ms.unwrap());
            }
        }
        assert_eq!(backoffs, vec![200, 400, 800]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_and_panics_are_reported_without_stopping() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = Arc::clone(&ticks);
        let poll = PollFn::arc("flaky", move || {
            let t = Arc::clone(&t);
            async move {
                let n = t.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    panic!("boom");
                }
                Err::<PollOutcome, _>(ChannelError::Shutdown)
            }
        });
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let join = tokio::spawn(poll_loop(
            poll,
            ListenerHandle::next(),
            Cadence {
                interval: Duration::from_millis(100),
                idle: BackoffPolicy::constant(Duration::from_millis(100)),
            },
            Some(bus),
            token.clone(),
        ));

        time::sleep(Duration::from_millis(150)).await;
        token.cancel();
        join.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        let reasons: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::TickFailed)
            .map(|e| e.reason.unwrap().to_string())
            .collect();
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].contains("boom"));
        assert!(reasons[1].contains("shut down"));
    }
}
