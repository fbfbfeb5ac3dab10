//! # Listener callbacks.
//!
//! - [`Listener`] trait for message consumers
//! - [`ListenerFn`] closure-backed implementation
//! - [`ListenerRef`] shared reference (`Arc<dyn Listener>`)
//! - [`Delivery`] what a listener receives

mod listener;
mod listener_fn;

pub use listener::{Delivery, Listener, ListenerError, ListenerRef};
pub use listener_fn::ListenerFn;
