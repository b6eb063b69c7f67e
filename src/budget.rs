//! Sampling budget carried across windows.
//!
//! The pool tracks an exponential moving average of how many events were
//! sampled per window and turns the shortfall against the per-window target
//! into the budget for the next window. Windows that under-sample leave
//! budget for later ones, over-sampling windows eat into it.

use crate::error::{Result, SamplerError};

/// Consumable quota of samples, replenished once per window.
///
/// After each window the budget is
/// `round(max(samples_per_window - avg_samples, 0) * lookback)`, where
/// `avg_samples` is the moving average of sampled events per window. The
/// result always lies in `[0, samples_per_window * lookback]`.
///
/// With a lookback of 1 the average is simply the last window's count, so the
/// budget is `samples_per_window - window_samples`, floored at zero.
///
/// # Example
///
/// ```rust
/// use adaptive_sampler_core::budget::BudgetPool;
///
/// let mut pool = BudgetPool::new(2, 1).unwrap();
/// // Warm-up allowance: target * (lookback + 1)
/// assert_eq!(pool.budget(), 4);
///
/// assert_eq!(pool.consume(1), 1);
/// assert_eq!(pool.consume(2), 0);
/// assert_eq!(pool.consume(5), 0); // never negative
/// ```
#[derive(Debug, Clone)]
pub struct BudgetPool {
    /// Target number of samples per window
    samples_per_window: u64,
    /// Number of windows the budget is carried across
    lookback: u64,
    /// Weight of the most recent window in the moving average
    alpha: f64,
    /// Moving average of sampled events per window
    avg_samples: f64,
    /// Budget for the window in progress
    budget: u64,
}

impl BudgetPool {
    /// Creates a pool holding the warm-up allowance
    /// `samples_per_window * (lookback + 1)`.
    ///
    /// # Errors
    /// * [`SamplerError::InvalidSamplesPerWindow`] if `samples_per_window` is zero
    /// * [`SamplerError::InvalidBudgetLookback`] if `lookback` is zero
    pub fn new(samples_per_window: u64, lookback: usize) -> Result<Self> {
        if samples_per_window == 0 {
            return Err(SamplerError::InvalidSamplesPerWindow);
        }
        if lookback == 0 {
            return Err(SamplerError::InvalidBudgetLookback(lookback));
        }
        let lookback = lookback as u64;
        Ok(BudgetPool {
            samples_per_window,
            lookback,
            alpha: interval_alpha(lookback),
            avg_samples: 0.0,
            budget: samples_per_window.saturating_mul(lookback.saturating_add(1)),
        })
    }

    /// Accounts for the samples consumed by a completed window and returns the
    /// budget for the next one.
    pub fn consume(&mut self, window_samples: u64) -> u64 {
        let sampled = window_samples as f64;
        self.avg_samples = if self.alpha <= 0.0 {
            sampled
        } else {
            self.avg_samples + self.alpha * (sampled - self.avg_samples)
        };

        let shortfall = (self.samples_per_window as f64 - self.avg_samples).max(0.0);
        // `as` saturates; the min guards against float rounding above the cap
        self.budget = ((shortfall * self.lookback as f64).round() as u64).min(self.max_budget());
        self.budget
    }

    /// Budget for the window in progress.
    #[inline]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Largest budget a completed window can produce.
    #[inline]
    pub fn max_budget(&self) -> u64 {
        self.samples_per_window.saturating_mul(self.lookback)
    }

    /// Moving average of sampled events per window.
    #[inline]
    pub fn avg_samples(&self) -> f64 {
        self.avg_samples
    }
}

/// Weight of the newest value in an exponential moving average that looks
/// back `lookback` values.
///
/// Values more than `lookback` steps old end up weighing less than they would
/// in a plain arithmetic mean over `lookback` values. A lookback of 1 yields
/// zero, which callers treat as "use the newest value only".
pub fn interval_alpha(lookback: u64) -> f64 {
    let lookback = lookback as f64;
    1.0 - lookback.powf(-1.0 / lookback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            BudgetPool::new(0, 1).unwrap_err(),
            SamplerError::InvalidSamplesPerWindow
        );
        assert_eq!(
            BudgetPool::new(10, 0).unwrap_err(),
            SamplerError::InvalidBudgetLookback(0)
        );
    }

    #[test]
    fn single_window_lookback_uses_last_window() {
        let mut pool = BudgetPool::new(2, 1).unwrap();
        assert_eq!(pool.budget(), 4);
        assert_eq!(pool.consume(1), 1);
        assert_eq!(pool.consume(2), 0);
        assert_eq!(pool.consume(0), 2);
        assert_eq!(pool.avg_samples(), 0.0);
    }

    #[test]
    fn alpha_for_single_window_is_zero() {
        assert_eq!(interval_alpha(1), 0.0);
        let alpha = interval_alpha(16);
        assert!(alpha > 0.0 && alpha < 1.0);
    }

    #[test]
    fn budget_stays_within_bounds() {
        let mut pool = BudgetPool::new(100, 16).unwrap();
        assert_eq!(pool.budget(), 1700);
        for sampled in [0, 0, 5000, 0, 100, 10_000, 0, 0, 0, 0, 0, 0, 0] {
            let budget = pool.consume(sampled);
            assert!(budget <= pool.max_budget());
        }
    }

    #[test]
    fn idle_windows_replenish_budget() {
        let mut pool = BudgetPool::new(100, 16).unwrap();
        pool.consume(1000);
        assert_eq!(pool.budget(), 0);

        let mut last = 0;
        for _ in 0..40 {
            let budget = pool.consume(0);
            assert!(budget >= last);
            last = budget;
        }
        // The average decays towards zero, so the budget approaches the cap
        assert!(last > 1500);
        assert!(last <= 1600);
    }
}
