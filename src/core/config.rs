//! # Engine configuration.
//!
//! [`Config`] centralizes every tunable of a [`ChannelEngine`](crate::ChannelEngine); it is
//! passed once to [`ChannelEngine::builder`](crate::ChannelEngine::builder).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by the bus
//! - `grace = 0s` → shutdown does not wait for in-flight removals

use std::time::Duration;

use crate::channel::DEFAULT_NAMESPACE;
use crate::policies::BackoffPolicy;
use crate::store::LockLimits;

/// When a dispatcher invokes its listener relative to the channel lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Pop, invoke and persist under one lock acquisition.
    ///
    /// Listener latency counts against the fuse; a listener must not touch its own channel.
    #[default]
    InLock,
    /// Pop and persist under the lock, invoke after release.
    AfterCommit,
}

/// Configuration of a channel engine.
///
/// ## Field semantics
/// - `namespace`: prefix of every channel key in the shared store
/// - `poll_interval`: base delay between dispatch ticks while messages keep arriving
/// - `idle_backoff`: stretches the delay while a queue stays empty or ticks fail
/// - `lock_wait` / `fuse`: bounds of every critical section
/// - `dispatch_mode`: see [`DispatchMode`]
/// - `bus_capacity`: event bus ring buffer size
/// - `grace`: bound on [`run_until_signal`](crate::ChannelEngine::run_until_signal) shutdown
#[derive(Clone, Debug)]
pub struct Config {
    /// Prefix prepended to user channel keys.
    pub namespace: String,

    /// Base delay between dispatch ticks.
    pub poll_interval: Duration,

    /// Delay growth while a dispatcher finds nothing to deliver; reset on delivery.
    ///
    /// The effective delay is never shorter than `poll_interval`.
    pub idle_backoff: BackoffPolicy,

    /// Maximum time to wait for a channel lock.
    pub lock_wait: Duration,

    /// Maximum time a critical section may hold a channel lock.
    pub fuse: Duration,

    /// Listener invocation relative to the lock.
    pub dispatch_mode: DispatchMode,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Receivers that lag more than `bus_capacity` events skip older ones.
    pub bus_capacity: usize,

    /// Maximum time `run_until_signal` waits for listeners to detach.
    pub grace: Duration,
}

impl Config {
    /// Lock bounds for [`atomic_execute`](crate::atomic_execute).
    #[inline]
    pub fn lock_limits(&self) -> LockLimits {
        LockLimits {
            wait: self.lock_wait,
            fuse: self.fuse,
        }
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// - `namespace = "slotbus:channel:"`
    /// - `poll_interval = 100ms`, `idle_backoff = BackoffPolicy::default()`
    /// - `lock_wait = 5s`, `fuse = 60s`
    /// - `dispatch_mode = InLock`
    /// - `bus_capacity = 1024`, `grace = 10s`
    fn default() -> Self {
        let limits = LockLimits::default();
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            poll_interval: Duration::from_millis(100),
            idle_backoff: BackoffPolicy::default(),
            lock_wait: limits.wait,
            fuse: limits.fuse,
            dispatch_mode: DispatchMode::InLock,
            bus_capacity: 1024,
            grace: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_lock_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.lock_limits(), LockLimits::default());
        assert_eq!(cfg.namespace, "slotbus:channel:");
        assert_eq!(cfg.dispatch_mode, DispatchMode::InLock);
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
