//! # Function-backed poll (`PollFn`)
//!
//! [`PollFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh future per tick.
//! Shared state between ticks goes in an explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use slotbus::{ChannelError, PollFn, PollOutcome, PollRef};
//!
//! let p: PollRef = PollFn::arc("noop", || async { Ok::<_, ChannelError>(PollOutcome::Idle) });
//! assert_eq!(p.name(), "noop");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::polls::poll::{Poll, PollOutcome};

/// Function-backed poll implementation.
#[derive(Debug)]
pub struct PollFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> PollFn<F> {
    /// Creates a new function-backed poll.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the poll and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Poll for PollFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PollOutcome, ChannelError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&self) -> Result<PollOutcome, ChannelError> {
        (self.f)().await
    }
}
