//! Error types used by the channel engine and its collaborators.
//!
//! - [`ChannelError`]: failures of engine operations (publish, listener lifecycle, dispatch ticks).
//! - [`StoreError`]: failures reported by a [`SharedStore`](crate::SharedStore).
//! - [`ScheduleError`]: failures reported by a [`Scheduler`](crate::Scheduler).
//! - [`RuntimeError`]: failures of the engine runtime itself (shutdown).
//!
//! All enums provide `as_label` (stable snake_case label for logs/metrics).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by channel engine operations.
///
/// Lock failures ([`LockTimeout`](ChannelError::LockTimeout), [`FuseBlown`](ChannelError::FuseBlown))
/// are never retried by the engine: the next scheduled tick or the next caller invocation is the retry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// This process already holds a listener for the channel.
    #[error("listener already registered for channel {channel}")]
    DuplicateListener {
        /// Resolved channel key.
        channel: String,
    },

    /// The channel lock could not be acquired within the configured wait.
    #[error("lock on {key} not acquired within {waited:?}")]
    LockTimeout {
        /// Lock key.
        key: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The critical section outlived the fuse and was aborted; its writes (if any) are not guaranteed.
    #[error("critical section on {key} exceeded fuse {fuse:?}")]
    FuseBlown {
        /// Lock key.
        key: String,
        /// Configured fuse.
        fuse: Duration,
    },

    /// The scheduler refused the polling task; nothing was persisted.
    #[error("listener registration on {channel} failed: {reason}")]
    ListenerRegistration {
        /// Resolved channel key.
        channel: String,
        /// Scheduler error message.
        reason: String,
    },

    /// The listener failed (error or panic) while handling a delivered message.
    ///
    /// The message was already popped from its queue and is lost.
    #[error("listener for {channel}/{worker} failed: {error}")]
    Listener {
        /// Resolved channel key.
        channel: String,
        /// Worker slot the message was popped from.
        worker: String,
        /// Listener error message.
        error: String,
    },

    /// The worker id collides with the reserved default bucket.
    #[error("worker id {worker:?} is reserved")]
    InvalidWorker {
        /// Offending worker id.
        worker: String,
    },

    /// The stored value under a channel key is not a valid channel state.
    #[error("corrupt channel state at {key}: {error}")]
    Corrupt {
        /// Store key.
        key: String,
        /// Decoding error.
        error: String,
    },

    /// The shared store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The engine has been shut down.
    #[error("channel engine is shut down")]
    Shutdown,
}

impl ChannelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use slotbus::ChannelError;
    ///
    /// let err = ChannelError::DuplicateListener { channel: "slotbus:channel:jobs".into() };
    /// assert_eq!(err.as_label(), "channel_duplicate_listener");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::DuplicateListener { .. } => "channel_duplicate_listener",
            ChannelError::LockTimeout { .. } => "channel_lock_timeout",
            ChannelError::FuseBlown { .. } => "channel_fuse_blown",
            ChannelError::ListenerRegistration { .. } => "channel_listener_registration",
            ChannelError::Listener { .. } => "channel_listener_failed",
            ChannelError::InvalidWorker { .. } => "channel_invalid_worker",
            ChannelError::Corrupt { .. } => "channel_corrupt_state",
            ChannelError::Store(_) => "channel_store",
            ChannelError::Shutdown => "channel_shutdown",
        }
    }

    /// Returns true for failures of the lock primitive (timeout or fuse).
    pub fn is_lock_failure(&self) -> bool {
        matches!(
            self,
            ChannelError::LockTimeout { .. } | ChannelError::FuseBlown { .. }
        )
    }
}

/// # Errors produced by a shared store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Lock acquisition gave up after `waited`.
    #[error("lock wait of {waited:?} elapsed")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The lease expired (fuse) and was taken over before it was released.
    #[error("lease {lease} on {key} was lost")]
    LeaseLost {
        /// Lock key.
        key: String,
        /// Lease id.
        lease: u64,
    },

    /// The backing store could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Backend message.
        reason: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Timeout { .. } => "store_timeout",
            StoreError::LeaseLost { .. } => "store_lease_lost",
            StoreError::Unavailable { .. } => "store_unavailable",
        }
    }
}

/// # Errors produced by a scheduler when registering a polling task.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The scheduler was shut down.
    #[error("scheduler closed")]
    Closed,

    /// The scheduler cannot accept the task.
    #[error("rejected: {reason}")]
    Rejected {
        /// Why the task was rejected.
        reason: String,
    },
}

impl ScheduleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::Closed => "schedule_closed",
            ScheduleError::Rejected { .. } => "schedule_rejected",
        }
    }
}

/// # Errors produced by the engine runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some listeners were not detached in time.
    #[error("shutdown timeout {grace:?} exceeded; still attached: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Channels whose listeners were still registered.
        stuck: Vec<String>,
    },

    /// OS signal handlers could not be installed.
    #[error("signal registration failed: {reason}")]
    Signal {
        /// I/O error message.
        reason: String,
    },

    /// A listener could not be detached during shutdown.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal { .. } => "runtime_signal",
            RuntimeError::Channel(e) => e.as_label(),
        }
    }
}
