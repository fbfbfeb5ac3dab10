use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::engine::ChannelEngine;
use crate::channel::ChannelStore;
use crate::events::{Bus, Event};
use crate::scheduler::{IntervalScheduler, Scheduler};
use crate::store::{MemoryStore, SharedStore};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`ChannelEngine`].
///
/// Defaults: an in-process [`MemoryStore`] and an [`IntervalScheduler`] driven by
/// `cfg.poll_interval` / `cfg.idle_backoff`.
pub struct EngineBuilder {
    cfg: Config,
    store: Option<Arc<dyn SharedStore>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            store: None,
            scheduler: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the shared store every process of the deployment talks to.
    pub fn with_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the scheduler ticking dispatchers.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets event subscribers.
    ///
    /// Each one gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the engine. Must be called within a tokio runtime.
    pub fn build(self) -> Arc<ChannelEngine> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let scheduler = self.scheduler.unwrap_or_else(|| {
            Arc::new(
                IntervalScheduler::new(self.cfg.poll_interval, self.cfg.idle_backoff)
                    .with_bus(bus.clone()),
            )
        });

        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            Some(subscriber_listener(subs, &bus, runtime_token.clone()))
        };

        Arc::new(ChannelEngine::new_internal(
            self.cfg,
            ChannelStore::new(store),
            scheduler,
            bus,
            listener,
            runtime_token,
        ))
    }
}

/// Forwards bus events to the subscriber set until `token` is cancelled, then drains
/// whatever is still buffered and waits for the subscribers to finish.
fn subscriber_listener(subs: SubscriberSet, bus: &Bus, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(ev),
                    Err(RecvError::Lagged(_)) => {
                        subs.emit(Event::subscriber_overflow("subscriber-listener", "lagged"));
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = token.cancelled() => break,
            }
        }
        while let Ok(ev) = rx.try_recv() {
            subs.emit(ev);
        }
        subs.shutdown().await;
    })
}
