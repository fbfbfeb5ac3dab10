//! # ChannelEngine: publish, listener lifecycle and shutdown.
//!
//! The engine owns the process-local side of the channel abstraction (listener registry,
//! event bus, subscriber fan-out) and reaches the shared side only through
//! [`atomic_execute`] over its [`SharedStore`](crate::SharedStore).
//!
//! ## Operations
//! ```text
//! publish(key, msg, opts)        ─► lock(channel) { read ─► fan out ─► write }
//! create_listener(key, w, l)     ─► registry.reserve
//!                                   lock(channel) { read ─► schedule_polling(dispatcher)
//!                                                   ─► attach + migrate default ─► write }
//!                                   registry.activate        (failure: cancel poll, release)
//! remove_listener(key, w, purge) ─► registry.handle
//!                                   lock(channel) { read ─► detach ─► write ─► cancel_polling }
//!                                   registry.take
//! get_channel(key)               ─► read (no lock)
//! ```
//!
//! ## Shutdown
//! ```text
//! shutdown()
//!   ├─► closed = true, publish ShutdownRequested
//!   ├─► remove_listener(purge = false) for every registry entry
//!   ├─► registry cleared, scheduler.close()
//!   └─► runtime_token.cancel() ─► subscriber listener drains the bus and the SubscriberSet
//!
//! run_until_signal()
//!   └─► wait_for_shutdown_signal ─► shutdown_with_grace()
//!          ├─► timeout(grace, detach all)
//!          │      ├─ done     ─► AllStoppedWithin
//!          │      └─ exceeded ─► GraceExceeded (stuck channels)
//!          └─► registry cleared, scheduler.close(), subscribers drained
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelKey, ChannelState, ChannelStore, ListenerHandle, SlotId, WorkerId};
use crate::core::builder::EngineBuilder;
use crate::core::config::Config;
use crate::core::dispatch::Dispatcher;
use crate::core::registry::ListenerRegistry;
use crate::core::shutdown;
use crate::error::{ChannelError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::listeners::ListenerRef;
use crate::polls::PollRef;
use crate::scheduler::Scheduler;
use crate::store::{LockMode, atomic_execute};

/// Options of a [`ChannelEngine::publish`] call.
///
/// ## Example
/// ```rust
/// use slotbus::PublishOptions;
///
/// let opts = PublishOptions::new().with_store(false).with_worker(3u64);
/// assert!(!opts.store);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOptions {
    /// Buffer for slots without a live listener (and in the default bucket).
    pub store: bool,
    /// Publishing worker; reported on events, fan-out stays broadcast.
    pub worker: Option<WorkerId>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            store: true,
            worker: None,
        }
    }
}

impl PublishOptions {
    /// `store = true`, no worker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether messages are buffered for absent listeners.
    #[must_use]
    pub fn with_store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    /// Sets the publishing worker.
    #[must_use]
    pub fn with_worker(mut self, worker: impl Into<WorkerId>) -> Self {
        self.worker = Some(worker.into());
        self
    }
}

/// Cross-process channel engine.
///
/// Built with [`ChannelEngine::builder`]; shared as `Arc<ChannelEngine>`.
pub struct ChannelEngine {
    cfg: Config,
    channels: ChannelStore,
    scheduler: Arc<dyn Scheduler>,
    registry: ListenerRegistry,
    bus: Bus,
    listener: Mutex<Option<JoinHandle<()>>>,
    runtime_token: CancellationToken,
    closed: AtomicBool,
}

impl ChannelEngine {
    /// Returns a builder for the engine.
    pub fn builder(cfg: Config) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        channels: ChannelStore,
        scheduler: Arc<dyn Scheduler>,
        bus: Bus,
        listener: Option<JoinHandle<()>>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            channels,
            scheduler,
            registry: ListenerRegistry::new(),
            bus,
            listener: Mutex::new(listener),
            runtime_token,
            closed: AtomicBool::new(false),
        }
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Namespaced store key of `user_key`.
    pub fn resolve_key(&self, user_key: &str) -> ChannelKey {
        ChannelKey::resolve(&self.cfg.namespace, user_key)
    }

    /// Receiver of every engine event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Snapshot of a channel's state. Takes no lock, so it may be stale by the time it returns.
    pub async fn get_channel(&self, user_key: &str) -> Result<ChannelState, ChannelError> {
        self.channels.read(&self.resolve_key(user_key)).await
    }

    /// Channels this process listens on, with their worker and handle, sorted by key.
    pub async fn listening(&self) -> Vec<(ChannelKey, WorkerId, ListenerHandle)> {
        self.registry.list().await
    }

    /// Publishes `message` on a channel.
    ///
    /// - No slots: buffered in the default bucket if `opts.store`, otherwise dropped.
    /// - Otherwise appended to every slot with a live listener, and to every other slot
    ///   too if `opts.store`.
    ///
    /// Returns `Ok(true)` once the write is committed.
    pub async fn publish(
        &self,
        user_key: &str,
        message: impl Into<Value>,
        opts: PublishOptions,
    ) -> Result<bool, ChannelError> {
        self.ensure_running()?;
        let key = self.resolve_key(user_key);
        let message = message.into();
        let store = opts.store;

        let (channels, k) = (&self.channels, &key);
        let fanout = atomic_execute(
            channels.shared(),
            k.as_str(),
            LockMode::Exclusive,
            self.cfg.lock_limits(),
            move || async move {
                let mut state = channels.read(k).await?;
                let fanout = state.publish(message, store);
                channels.write(k, &state).await?;
                Ok(fanout)
            },
        )
        .await?;

        let event = |kind| {
            let ev = Event::new(kind).with_channel(key.as_str());
            match &opts.worker {
                Some(w) => ev.with_worker(w),
                None => ev,
            }
        };
        if fanout.enqueued > 0 {
            self.bus
                .publish(event(EventKind::MessagePublished).with_count(fanout.enqueued));
        }
        if fanout.buffered {
            self.bus.publish(event(EventKind::DefaultBuffered));
        }
        if fanout.dropped() {
            self.bus.publish(event(EventKind::MessageDropped));
        }
        Ok(true)
    }

    /// Attaches `listener` to `worker`'s slot of a channel and starts its dispatcher.
    ///
    /// Messages buffered in the default bucket are moved to the front of every slot.
    ///
    /// # Errors
    /// - [`ChannelError::DuplicateListener`] this process already listens on the channel
    /// - [`ChannelError::InvalidWorker`] the worker id is the reserved default id
    /// - [`ChannelError::ListenerRegistration`] the scheduler refused the poll
    /// - lock and store failures
    ///
    /// On any error nothing is persisted and no poll stays scheduled.
    pub async fn create_listener(
        &self,
        user_key: &str,
        worker: impl Into<WorkerId>,
        listener: ListenerRef,
    ) -> Result<ListenerHandle, ChannelError> {
        self.ensure_running()?;
        let key = self.resolve_key(user_key);
        let worker = worker.into();

        let slot = match SlotId::worker(&worker) {
            Ok(slot) => slot,
            Err(e) => return Err(self.rejected(&key, &worker, e)),
        };
        if let Err(e) = self.registry.reserve(&key, &worker).await {
            return Err(self.rejected(&key, &worker, e));
        }

        let poll: PollRef = Arc::new(Dispatcher {
            key: key.clone(),
            worker: worker.clone(),
            slot: slot.clone(),
            listener,
            channels: self.channels.clone(),
            limits: self.cfg.lock_limits(),
            mode: self.cfg.dispatch_mode,
            bus: self.bus.clone(),
        });

        let mut scheduled: Option<ListenerHandle> = None;
        let attached = {
            let (channels, scheduler, k, s) = (&self.channels, &*self.scheduler, &key, &slot);
            let scheduled = &mut scheduled;
            atomic_execute(
                channels.shared(),
                k.as_str(),
                LockMode::Exclusive,
                self.cfg.lock_limits(),
                move || async move {
                    let mut state = channels.read(k).await?;
                    let handle = scheduler.schedule_polling(poll).map_err(|e| {
                        ChannelError::ListenerRegistration {
                            channel: k.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    *scheduled = Some(handle);
                    let migrated = state.attach(s, handle);
                    channels.write(k, &state).await?;
                    Ok((handle, migrated))
                },
            )
            .await
        };

        let (handle, migrated) = match attached {
            Ok(done) => done,
            Err(e) => {
                if let Some(handle) = scheduled {
                    self.scheduler.cancel_polling(&handle);
                }
                self.registry.release(&key).await;
                return Err(self.rejected(&key, &worker, e));
            }
        };
        self.registry.activate(&key, handle).await;

        self.bus.publish(
            Event::new(EventKind::ListenerCreated)
                .with_channel(key.as_str())
                .with_worker(&worker)
                .with_handle(handle)
                .with_count(migrated),
        );
        if migrated > 0 {
            self.bus.publish(
                Event::new(EventKind::DefaultMigrated)
                    .with_channel(key.as_str())
                    .with_worker(&worker)
                    .with_count(migrated),
            );
        }
        Ok(handle)
    }

    /// Detaches this process's listener for `worker` from a channel.
    ///
    /// With `purge` the worker's slot and its unread messages are deleted; otherwise the
    /// queue stays for the next listener of that worker. Returns `Ok(false)` when this
    /// process has no such listener.
    ///
    /// The poll is cancelled only once the detach is persisted: on any error the listener
    /// stays attached and scheduled, and the call can be retried.
    ///
    /// A tick already in flight may still deliver one message after the poll is cancelled.
    pub async fn remove_listener(
        &self,
        user_key: &str,
        worker: impl Into<WorkerId>,
        purge: bool,
    ) -> Result<bool, ChannelError> {
        self.detach(&self.resolve_key(user_key), &worker.into(), purge)
            .await
    }

    /// Detaches every local listener (queues kept), clears the registry, closes the
    /// scheduler and drains subscribers. Idempotent.
    ///
    /// Returns the first detach failure; every poll is cancelled regardless.
    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        if !self.begin_shutdown() {
            return Ok(());
        }
        let detached = self.detach_all().await;
        self.stop_runtime().await;
        detached
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down within
    /// [`Config::grace`].
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        shutdown::wait_for_shutdown_signal()
            .await
            .map_err(|e| RuntimeError::Signal {
                reason: e.to_string(),
            })?;
        self.shutdown_with_grace().await
    }

    /// [`shutdown`](Self::shutdown) bounded by [`Config::grace`].
    ///
    /// Publishes `AllStoppedWithin` or `GraceExceeded`; in the latter case the channels
    /// still registered are reported and their polls cancelled anyway.
    pub async fn shutdown_with_grace(&self) -> Result<(), RuntimeError> {
        if !self.begin_shutdown() {
            return Ok(());
        }
        let grace = self.cfg.grace;
        let result = match time::timeout(grace, self.detach_all()).await {
            Ok(Ok(())) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Ok(Err(e)) => Err(RuntimeError::Channel(e)),
            Err(_elapsed) => {
                let stuck: Vec<String> = self
                    .registry
                    .list()
                    .await
                    .into_iter()
                    .map(|(key, _, _)| key.to_string())
                    .collect();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_count(stuck.len())
                        .with_delay(grace),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.stop_runtime().await;
        result
    }

    fn begin_shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        true
    }

    async fn detach_all(&self) -> Result<(), ChannelError> {
        let mut first_err = None;
        for (key, worker, _) in self.registry.list().await {
            if let Err(e) = self.detach(&key, &worker, false).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn detach(
        &self,
        key: &ChannelKey,
        worker: &WorkerId,
        purge: bool,
    ) -> Result<bool, ChannelError> {
        let Ok(slot) = SlotId::worker(worker) else {
            return Ok(false);
        };
        let handle = match self.registry.handle(key).await {
            Some((registered, handle)) if SlotId::worker(&registered).ok().as_ref() == Some(&slot) => {
                handle
            }
            _ => return Ok(false),
        };

        let (channels, scheduler, k, s, h) = (&self.channels, &*self.scheduler, key, &slot, &handle);
        let left = atomic_execute(
            channels.shared(),
            k.as_str(),
            LockMode::Exclusive,
            self.cfg.lock_limits(),
            move || async move {
                let mut state = channels.read(k).await?;
                let left = state.detach(s, h, purge);
                channels.write(k, &state).await?;
                scheduler.cancel_polling(h);
                Ok(left)
            },
        )
        .await?;
        self.registry.take(key, &handle).await;

        self.bus.publish(
            Event::new(EventKind::ListenerRemoved)
                .with_channel(key.as_str())
                .with_worker(worker)
                .with_handle(handle)
                .with_count(left)
                .with_reason(if purge { "purged" } else { "kept" }),
        );
        Ok(true)
    }

    async fn stop_runtime(&self) {
        self.registry.clear().await;
        self.scheduler.close();
        self.runtime_token.cancel();

        let listener = self.listener.lock().ok().and_then(|mut l| l.take());
        if let Some(join) = listener {
            let _ = join.await;
        }
    }

    fn ensure_running(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Shutdown);
        }
        Ok(())
    }

    fn rejected(&self, key: &ChannelKey, worker: &WorkerId, err: ChannelError) -> ChannelError {
        self.bus.publish(
            Event::new(EventKind::ListenerRejected)
                .with_channel(key.as_str())
                .with_worker(worker)
                .with_reason(err.to_string()),
        );
        err
    }
}
