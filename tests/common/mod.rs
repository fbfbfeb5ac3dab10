//! Shared fixtures: engines over one in-memory store, driven by manual schedulers.
//!
//! Two engines built on the same [`MemoryStore`] behave like two worker processes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use slotbus::{
    ChannelEngine, ChannelState, Config, Delivery, ListenerError, ListenerFn, ListenerRef,
    LockLease, LockMode, ManualScheduler, MemoryStore, PollOutcome, SharedStore, StoreError,
    WorkerId,
};

/// One simulated process.
pub struct Process {
    pub engine: Arc<ChannelEngine>,
    pub sched: Arc<ManualScheduler>,
}

pub fn process(store: &Arc<MemoryStore>, cfg: Config) -> Process {
    process_on(store.clone(), cfg)
}

pub fn process_on(store: Arc<dyn SharedStore>, cfg: Config) -> Process {
    let sched = Arc::new(ManualScheduler::new());
    let engine = ChannelEngine::builder(cfg)
        .with_store(store)
        .with_scheduler(sched.clone())
        .build();
    Process { engine, sched }
}

/// Memory store whose writes can be slowed down or made to fail.
#[derive(Default)]
pub struct Flaky {
    pub inner: MemoryStore,
    write_delay: Duration,
    fail_writes: AtomicBool,
}

impl Flaky {
    pub fn slow_writes(delay: Duration) -> Self {
        Self {
            write_delay: delay,
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl SharedStore for Flaky {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "disk full".into(),
            });
        }
        self.inner.set(key, value).await
    }

    async fn acquire(
        &self,
        key: &str,
        mode: LockMode,
        wait: Duration,
        fuse: Duration,
    ) -> Result<LockLease, StoreError> {
        self.inner.acquire(key, mode, wait, fuse).await
    }

    async fn release(&self, lease: LockLease) -> Result<(), StoreError> {
        self.inner.release(lease).await
    }
}

pub fn single() -> (Process, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (process(&store, Config::default()), store)
}

pub type Seen = Arc<Mutex<Vec<Value>>>;

/// Listener recording every message it receives.
pub fn recorder() -> (ListenerRef, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let l: ListenerRef = ListenerFn::arc("recorder", move |d: &Delivery| {
        s.lock().unwrap().push(d.message.clone());
        Ok(())
    });
    (l, seen)
}

/// Listener failing on `bad` messages and recording the rest.
pub fn picky(bad: Value) -> (ListenerRef, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let l: ListenerRef = ListenerFn::arc("picky", move |d: &Delivery| {
        if d.message == bad {
            return Err(ListenerError::new("refused"));
        }
        s.lock().unwrap().push(d.message.clone());
        Ok(())
    });
    (l, seen)
}

pub fn seen(s: &Seen) -> Vec<Value> {
    s.lock().unwrap().clone()
}

/// Queue of `worker`'s slot, empty when the slot is absent.
pub fn queue(state: &ChannelState, worker: impl Into<WorkerId>) -> Vec<Value> {
    state
        .worker(&worker.into())
        .map(|s| s.queue.iter().cloned().collect())
        .unwrap_or_default()
}

/// Ticks the poll of `p`'s single listener until it reports idle; returns the tick count.
pub async fn drain(p: &Process) -> usize {
    let handles = p.sched.handles();
    assert_eq!(handles.len(), 1, "drain expects exactly one listener");
    let mut ticks = 0;
    loop {
        ticks += 1;
        match p.sched.tick(&handles[0]).await {
            Some(Ok(PollOutcome::Busy)) => continue,
            Some(Ok(PollOutcome::Idle)) => return ticks,
            other => panic!("unexpected tick result {other:?}"),
        }
    }
}
