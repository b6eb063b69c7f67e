//! Observer channel for window rollovers.

use std::panic::{self, AssertUnwindSafe};

use log::warn;

/// Statistics delivered to a [`WindowListener`] once at construction and
/// after every rollover.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    /// Events tested during the completed window
    pub window_tests: u64,
    /// Events sampled during the completed window
    pub window_samples: u64,
    /// Sampling budget for the next window
    pub budget: u64,
    /// Smoothed number of events per window
    pub total_average: f64,
    /// Sampling probability for the next window
    pub probability: f64,
}

/// Receives [`WindowStats`] on the thread running the rollover.
///
/// Listeners are advisory: a panicking listener is logged and ignored, the
/// rollover has already published its state when the listener runs.
///
/// Any `Fn(&WindowStats) + Send + Sync` closure is a listener.
pub trait WindowListener: Send + Sync {
    fn on_window_roll(&self, stats: &WindowStats);
}

impl<F> WindowListener for F
where
    F: Fn(&WindowStats) + Send + Sync,
{
    #[inline]
    fn on_window_roll(&self, stats: &WindowStats) {
        self(stats)
    }
}

/// Calls the listener, containing any panic it raises.
///
/// Returns `false` if the listener panicked.
pub(crate) fn notify(listener: &dyn WindowListener, stats: &WindowStats) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| listener.on_window_roll(stats))) {
        Ok(()) => true,
        Err(cause) => {
            let message = cause
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| cause.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            warn!("window listener panicked, ignoring: {}", message);
            false
        }
    }
}
