//! # Closure-backed listener (`ListenerFn`)
//!
//! Wraps a synchronous `Fn(&Delivery) -> Result<(), ListenerError>`; the common case for
//! short callbacks that hand the message off (push to an mpsc, bump a counter).
//!
//! ## Example
//! ```rust
//! use slotbus::{ListenerFn, ListenerRef};
//!
//! let l: ListenerRef = ListenerFn::arc("print", |d| {
//!     println!("{}", d.message);
//!     Ok(())
//! });
//! assert_eq!(l.name(), "print");
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::listeners::listener::{Delivery, Listener, ListenerError};

/// Function-backed listener.
pub struct ListenerFn<F> {
    name: &'static str,
    f: F,
}

impl<F> ListenerFn<F>
where
    F: Fn(&Delivery) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    /// Creates a new function-backed listener.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F> Listener for ListenerFn<F>
where
    F: Fn(&Delivery) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    async fn on_message(&self, delivery: &Delivery) -> Result<(), ListenerError> {
        (self.f)(delivery)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
