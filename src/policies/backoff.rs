//! # Backoff policy for idle or failing polls.
//!
//! A poll loop ticks at the configured base interval while it keeps finding work. Each
//! consecutive idle or failed tick extends a *streak*; [`BackoffPolicy::next`] maps the
//! streak to the next delay:
//!
//! ```text
//! delay(streak) = jitter( min(first × factor^streak, max) )
//! ```
//!
//! The base is derived from the streak alone, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use slotbus::{BackoffPolicy, JitterPolicy};
//!
//! let idle = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(idle.next(0), Duration::from_millis(100));
//! assert_eq!(idle.next(3), Duration::from_millis(800));
//! assert_eq!(idle.next(10), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Streak-driven delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for the first idle tick.
    pub first: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
    /// Growth per additional idle tick (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied on top of the base delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 1.5`, `max = 1s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 1.5,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A policy that always yields `delay`.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after `streak` consecutive idle/failed ticks (0-indexed).
    pub fn next(&self, streak: u32) -> Duration {
        let exp = streak.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn grows_exponentially_then_caps() {
        let policy = doubling(JitterPolicy::None);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(4), Duration::from_millis(1600));
        assert_eq!(policy.next(100), Duration::from_secs(30));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn constant_never_moves() {
        let policy = BackoffPolicy::constant(Duration::from_millis(250));
        for streak in [0, 1, 7, 1000] {
            assert_eq!(policy.next(streak), Duration::from_millis(250));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(1),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(1));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_base() {
        let policy = doubling(JitterPolicy::Equal);
        for streak in 0..12 {
            let base_ms = (100.0 * 2.0f64.powi(streak as i32)).min(30_000.0) as u64;
            let delay = policy.next(streak);
            assert!(delay >= Duration::from_millis(base_ms / 2), "streak {streak}: {delay:?}");
            assert!(delay <= Duration::from_millis(base_ms), "streak {streak}: {delay:?}");
        }
    }

    #[test]
    fn full_jitter_never_exceeds_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..BackoffPolicy::constant(Duration::from_millis(500))
        };
        for streak in 0..50 {
            assert!(policy.next(streak) <= Duration::from_millis(500));
        }
    }
}
