//! # Event bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The engine, its dispatchers
//! and the scheduler publish; the engine's subscriber listener fans events out to the
//! [`SubscriberSet`](crate::SubscriberSet), and callers may take raw receivers.
//!
//! ```text
//!   engine ops ──┐
//!   dispatchers ─┼──► Bus ──► subscriber listener ──► SubscriberSet
//!   scheduler  ──┘      └───► ChannelEngine::subscribe() receivers
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; without receivers the event is dropped.
//! - Receivers that fall more than `capacity` events behind observe `RecvError::Lagged(n)`.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for engine events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus; `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver observing events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_after_subscribing() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::AllStoppedWithin));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::AllStoppedWithin);
    }
}
