//! # Event subscriber trait.
//!
//! [`Subscribe`] plugs custom handlers (metrics, audit, alerting) into the engine's event
//! stream. Each subscriber gets a dedicated worker task and a bounded queue, see
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use slotbus::{Event, EventKind, Subscribe};
//!
//! struct LostMessages;
//!
//! #[async_trait]
//! impl Subscribe for LostMessages {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ListenerFailed | EventKind::MessageDropped) {
//!             // bump a counter, page someone, ...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "lost-messages" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Engine event subscriber.
///
/// - Events arrive in FIFO order, on the subscriber's own worker task.
/// - A slow subscriber only fills its own queue; overflow drops the event for it alone.
/// - Panics are caught and reported as `EventKind::SubscriberPanicked`.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events. Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity for this subscriber (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
