//! Wall-clock abstraction for deterministic testing.
//!
//! Every persisted timestamp in this system (creation times, fetch times,
//! TTL cutoffs) is wall-clock milliseconds, so the capability is a single
//! `now_millis`. Stores hold their clock; tests inject a [`ManualClock`] and
//! advance it explicitly to exercise expiry and inactivity cutoffs without
//! sleeping.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Milliseconds-since-epoch clock capability.
///
/// # Invariants
///
/// - `now_millis()` never decreases within a single execution context.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current wall-clock time, milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Production clock backed by [`std::time::SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};

        #[allow(clippy::expect_used, reason = "a system clock before 1970 is unrecoverable")]
        let elapsed =
            SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before Unix epoch");
        elapsed.as_millis() as u64
    }
}

/// Manually advanced clock for tests.
///
/// Clones share the same underlying time, so a clock handed to a store can be
/// advanced from the test body.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_millis)) }
    }

    /// Advance the clock by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Advance the clock by whole days.
    pub fn advance_days(&self, days: u64) {
        self.advance(days * 86_400_000);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);

        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);

        clock.advance_days(1);
        assert_eq!(clock.now_millis(), 1_500 + 86_400_000);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let other = clock.clone();

        clock.advance(42);
        assert_eq!(other.now_millis(), 42);
    }

    #[test]
    fn system_clock_is_past_2020() {
        // 2020-01-01 in ms; catches accidental seconds/millis confusion.
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
