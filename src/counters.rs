//! Lock-free test/sample counters.
//!
//! [`RunningCounters`] keeps two pairs of counters: lifetime totals that only
//! ever grow, and per-window totals that the rollover captures and resets.
//! Every update is a single atomic read-modify-write, so concurrent callers
//! never lose or duplicate an increment. An event racing a rollover may be
//! attributed to either side of the window boundary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the lifetime counters.
///
/// `tests >= samples` holds for every snapshot returned by
/// [`RunningCounters::counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountsSnapshot {
    /// Events tested since construction.
    pub tests: u64,
    /// Events sampled since construction.
    pub samples: u64,
}

/// Totals captured from a completed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowCounts {
    /// Events tested during the window.
    pub tests: u64,
    /// Events sampled during the window.
    pub samples: u64,
}

/// Lifetime and per-window counters shared by all calling threads.
#[derive(Debug, Default)]
pub struct RunningCounters {
    lifetime_tests: AtomicU64,
    lifetime_samples: AtomicU64,
    window_tests: AtomicU64,
    window_samples: AtomicU64,
}

impl RunningCounters {
    /// Creates a new set of counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one tested event.
    #[inline]
    pub fn record_test(&self) {
        self.window_tests.fetch_add(1, Ordering::Relaxed);
        self.lifetime_tests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one sampled event unconditionally.
    ///
    /// Must follow a [`record_test`](Self::record_test) for the same event.
    #[inline]
    pub fn record_sample(&self) {
        self.window_samples.fetch_add(1, Ordering::Relaxed);
        // Release pairs with the Acquire in `counts`: a reader that sees this
        // sample also sees the test recorded before it.
        self.lifetime_samples.fetch_add(1, Ordering::Release);
    }

    /// Records one sampled event if the window has fewer than `limit` samples.
    ///
    /// The check and the increment are one atomic update, so concurrent
    /// callers can never push the window past `limit`.
    ///
    /// # Returns
    /// * `true` if the sample was recorded
    /// * `false` if the window already holds `limit` samples
    #[inline]
    pub fn try_record_sample(&self, limit: u64) -> bool {
        let recorded = self
            .window_samples
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                (count < limit).then_some(count + 1)
            })
            .is_ok();
        if recorded {
            self.lifetime_samples.fetch_add(1, Ordering::Release);
        }
        recorded
    }

    /// Captures the current window totals and resets them to zero.
    ///
    /// Each counter is swapped atomically; increments that land after the
    /// swap belong to the next window.
    pub fn take_window(&self) -> WindowCounts {
        let tests = self.window_tests.swap(0, Ordering::AcqRel);
        let samples = self.window_samples.swap(0, Ordering::AcqRel);
        WindowCounts { tests, samples }
    }

    /// Returns the totals of the window in progress without resetting them.
    pub fn window(&self) -> WindowCounts {
        let samples = self.window_samples.load(Ordering::Acquire);
        let tests = self.window_tests.load(Ordering::Acquire);
        WindowCounts { tests, samples }
    }

    /// Returns the lifetime number of tested events.
    #[inline]
    pub fn test_count(&self) -> u64 {
        self.lifetime_tests.load(Ordering::Acquire)
    }

    /// Returns the lifetime number of sampled events.
    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.lifetime_samples.load(Ordering::Acquire)
    }

    /// Returns a consistent pair of lifetime counters.
    pub fn counts(&self) -> CountsSnapshot {
        // Samples first: every sample seen here was preceded by its test.
        let samples = self.lifetime_samples.load(Ordering::Acquire);
        let tests = self.lifetime_tests.load(Ordering::Acquire);
        CountsSnapshot { tests, samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_sample_stops_at_limit() {
        let counters = RunningCounters::new();
        for _ in 0..5 {
            counters.record_test();
        }
        assert!(counters.try_record_sample(2));
        assert!(counters.try_record_sample(2));
        assert!(!counters.try_record_sample(2));
        assert_eq!(counters.window(), WindowCounts { tests: 5, samples: 2 });
        assert_eq!(counters.sample_count(), 2);
    }

    #[test]
    fn zero_limit_never_records() {
        let counters = RunningCounters::new();
        counters.record_test();
        assert!(!counters.try_record_sample(0));
        assert_eq!(counters.counts(), CountsSnapshot { tests: 1, samples: 0 });
    }

    #[test]
    fn take_window_resets_window_but_not_lifetime() {
        let counters = RunningCounters::new();
        counters.record_test();
        counters.record_sample();
        counters.record_test();

        assert_eq!(counters.take_window(), WindowCounts { tests: 2, samples: 1 });
        assert_eq!(counters.window(), WindowCounts::default());
        assert_eq!(counters.counts(), CountsSnapshot { tests: 2, samples: 1 });

        // Window limit applies to the fresh window only
        counters.record_test();
        assert!(counters.try_record_sample(1));
        assert_eq!(counters.counts(), CountsSnapshot { tests: 3, samples: 2 });
    }
}
