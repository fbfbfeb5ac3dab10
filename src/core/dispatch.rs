//! # Dispatcher: per-listener poll delivering one message per tick.
//!
//! ```text
//! tick() ── InLock ──► atomic_execute(channel) {
//!                         read ─► pop(slot) ─┬─ None ──► Idle          (nothing persisted)
//!                                            └─ Some(m) ─► write ─► deliver(m) ─► Busy | Listener error
//!                       }
//!
//! tick() ── AfterCommit ─► atomic_execute(channel) { read ─► pop ─► write }
//!                          └─► deliver(m) after release
//! ```
//!
//! ## Rules
//! - At most one message per tick.
//! - The pop is persisted before the listener runs; a failed message is not redelivered.
//! - Listener panics are caught and reported like errors.
//! - In `InLock` mode a listener outliving the fuse is cut off: the tick fails with
//!   `FuseBlown`, `ListenerFailed` is published and the message stays consumed.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use crate::channel::{ChannelKey, ChannelStore, SlotId, WorkerId};
use crate::core::config::DispatchMode;
use crate::error::ChannelError;
use crate::events::{Bus, Event, EventKind};
use crate::listeners::{Delivery, ListenerRef};
use crate::polls::{Poll, PollOutcome};
use crate::store::{LockLimits, LockMode, atomic_execute};
use crate::subscribers::panic_message;

pub(crate) struct Dispatcher {
    pub key: ChannelKey,
    pub worker: WorkerId,
    pub slot: SlotId,
    pub listener: ListenerRef,
    pub channels: ChannelStore,
    pub limits: LockLimits,
    pub mode: DispatchMode,
    pub bus: Bus,
}

impl Dispatcher {
    async fn tick_in_lock(&self) -> Result<PollOutcome, ChannelError> {
        let (channels, key, slot) = (&self.channels, &self.key, &self.slot);
        let delivering = AtomicBool::new(false);
        let started = &delivering;
        let ticked = atomic_execute(
            channels.shared(),
            key.as_str(),
            LockMode::Exclusive,
            self.limits,
            move || async move {
                let mut state = channels.read(key).await?;
                let Some(message) = state.pop(slot) else {
                    return Ok(PollOutcome::Idle);
                };
                let remaining = state.slot(slot).map_or(0, |s| s.queue.len());
                channels.write(key, &state).await?;
                started.store(true, Ordering::Release);
                self.deliver(message, remaining).await?;
                Ok(PollOutcome::Busy)
            },
        )
        .await;

        if let Err(e) = &ticked {
            if matches!(e, ChannelError::FuseBlown { .. }) && delivering.load(Ordering::Acquire) {
                self.listener_failed(&e.to_string());
            }
        }
        ticked
    }

    async fn tick_after_commit(&self) -> Result<PollOutcome, ChannelError> {
        let (channels, key, slot) = (&self.channels, &self.key, &self.slot);
        let popped = atomic_execute(
            channels.shared(),
            key.as_str(),
            LockMode::Exclusive,
            self.limits,
            move || async move {
                let mut state = channels.read(key).await?;
                let Some(message) = state.pop(slot) else {
                    return Ok(None);
                };
                let remaining = state.slot(slot).map_or(0, |s| s.queue.len());
                channels.write(key, &state).await?;
                Ok(Some((message, remaining)))
            },
        )
        .await?;

        match popped {
            None => Ok(PollOutcome::Idle),
            Some((message, remaining)) => {
                self.deliver(message, remaining).await?;
                Ok(PollOutcome::Busy)
            }
        }
    }

    async fn deliver(&self, message: Value, remaining: usize) -> Result<(), ChannelError> {
        let delivery = Delivery {
            channel: self.key.clone(),
            worker: self.worker.clone(),
            message,
        };
        let handled = AssertUnwindSafe(self.listener.on_message(&delivery))
            .catch_unwind()
            .await;

        let error = match handled {
            Ok(Ok(())) => {
                self.bus.publish(
                    Event::new(EventKind::MessageDelivered)
                        .with_channel(self.key.as_str())
                        .with_worker(&self.worker)
                        .with_count(remaining),
                );
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("listener panicked: {}", panic_message(&*payload)),
        };

        self.listener_failed(&error);
        Err(ChannelError::Listener {
            channel: self.key.to_string(),
            worker: self.worker.to_string(),
            error,
        })
    }

    fn listener_failed(&self, reason: &str) {
        self.bus.publish(
            Event::new(EventKind::ListenerFailed)
                .with_channel(self.key.as_str())
                .with_worker(&self.worker)
                .with_reason(reason),
        );
    }
}

#[async_trait]
impl Poll for Dispatcher {
    fn name(&self) -> &str {
        self.listener.name()
    }

    async fn tick(&self) -> Result<PollOutcome, ChannelError> {
        match self.mode {
            DispatchMode::InLock => self.tick_in_lock().await,
            DispatchMode::AfterCommit => self.tick_after_commit().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;
    use crate::listeners::{ListenerError, ListenerFn};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn dispatcher(
        channels: &ChannelStore,
        mode: DispatchMode,
        listener: ListenerRef,
    ) -> Dispatcher {
        let worker = WorkerId::from(1u64);
        Dispatcher {
            key: ChannelKey::resolve("t:", "jobs"),
            slot: SlotId::worker(&worker).unwrap(),
            worker,
            listener,
            channels: channels.clone(),
            limits: LockLimits::default(),
            mode,
            bus: Bus::new(16),
        }
    }

    async fn seed(channels: &ChannelStore, messages: &[Value]) {
        let mut state = ChannelState::new();
        let slot = SlotId::worker(&WorkerId::from(1u64)).unwrap();
        state.attach(&slot, crate::channel::ListenerHandle::next());
        for m in messages {
            state.publish(m.clone(), true);
        }
        channels
            .write(&ChannelKey::resolve("t:", "jobs"), &state)
            .await
            .unwrap();
    }

    fn recorder() -> (ListenerRef, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let l: ListenerRef = ListenerFn::arc("rec", move |d: &Delivery| {
            s.lock().unwrap().push(d.message.clone());
            Ok(())
        });
        (l, seen)
    }

    #[tokio::test]
    async fn delivers_one_message_per_tick_in_order() {
        for mode in [DispatchMode::InLock, DispatchMode::AfterCommit] {
            let channels = ChannelStore::new(Arc::new(MemoryStore::new()));
            seed(&channels, &[json!(1), json!(2)]).await;
            let (l, seen) = recorder();
            let d = dispatcher(&channels, mode, l);

            assert_eq!(d.tick().await.unwrap(), PollOutcome::Busy);
            assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
            assert_eq!(d.tick().await.unwrap(), PollOutcome::Busy);
            assert_eq!(d.tick().await.unwrap(), PollOutcome::Idle);
            assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2)]);
        }
    }

    #[tokio::test]
    async fn failed_listener_still_consumes_the_message() {
        let channels = ChannelStore::new(Arc::new(MemoryStore::new()));
        seed(&channels, &[json!("bad"), json!("good")]).await;
        let l = ListenerFn::arc("picky", |d: &Delivery| {
            if d.message == json!("bad") {
                Err(ListenerError::from("rejected"))
            } else {
                Ok(())
            }
        });
        let d = dispatcher(&channels, DispatchMode::InLock, l);

        let err = d.tick().await.unwrap_err();
        assert_eq!(err.as_label(), "channel_listener_failed");
        assert_eq!(d.tick().await.unwrap(), PollOutcome::Busy);

        let state = channels.read(&d.key).await.unwrap();
        assert!(state.slot(&d.slot).unwrap().queue.is_empty());
    }

    #[tokio::test]
    async fn panicking_listener_is_reported() {
        let channels = ChannelStore::new(Arc::new(MemoryStore::new()));
        seed(&channels, &[json!(1)]).await;
        let l = ListenerFn::arc("panicky", |_: &Delivery| -> Result<(), ListenerError> {
            panic!("kaboom")
        });
        let d = dispatcher(&channels, DispatchMode::InLock, l);
        let mut rx = d.bus.subscribe();

        match d.tick().await.unwrap_err() {
            ChannelError::Listener { error, .. } => assert!(error.contains("kaboom")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::ListenerFailed);
        assert_eq!(d.tick().await.unwrap(), PollOutcome::Idle);
    }

    #[tokio::test]
    async fn empty_slot_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let channels = ChannelStore::new(store.clone());
        let (l, _) = recorder();
        let d = dispatcher(&channels, DispatchMode::InLock, l);

        assert_eq!(d.tick().await.unwrap(), PollOutcome::Idle);
        assert!(store.keys().await.is_empty());
    }
}
