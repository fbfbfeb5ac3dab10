//! Poll pacing policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the poll delay grows while a listener stays idle or failing
//! - [`JitterPolicy`]  randomization so workers sharing a store do not poll in lockstep
//!
//! ## Wiring
//! ```text
//! Config { poll_interval, idle_backoff: BackoffPolicy, .. }
//!      └─► scheduler poll loop:
//!           - Busy tick          → sleep(poll_interval), streak = 0
//!           - Idle / failed tick → sleep(max(poll_interval, idle_backoff.next(streak))), streak += 1
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
