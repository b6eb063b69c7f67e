use crate::error::{Result, SamplerError};

/// Bounded history of per-window totals with a running mean.
///
/// Totals are kept in a circular array of `lookback` slots. Until the array
/// fills up, the mean is taken over the slots written so far, so the first
/// window already yields a usable estimate.
///
/// # Example
///
/// ```rust
/// use adaptive_sampler_core::moving_average::MovingAverage;
///
/// let mut average = MovingAverage::new(2).unwrap();
/// assert_eq!(average.push(10), 10.0);
/// assert_eq!(average.push(20), 15.0);
/// // The oldest total (10) falls out of the two-slot window
/// assert_eq!(average.push(40), 30.0);
/// ```
#[derive(Debug, Clone)]
pub struct MovingAverage {
    /// Totals for each slot (circular array)
    slots: Vec<u64>,
    /// Index of the slot the next total is written to
    next: usize,
    /// Number of slots written so far, capped at the slot count
    filled: usize,
    /// Sum of all written slots
    sum: u128,
}

impl MovingAverage {
    /// Creates an empty history holding up to `lookback` totals.
    ///
    /// # Errors
    /// Returns [`SamplerError::InvalidAverageLookback`] if `lookback` is zero.
    pub fn new(lookback: usize) -> Result<Self> {
        if lookback == 0 {
            return Err(SamplerError::InvalidAverageLookback(lookback));
        }
        Ok(MovingAverage {
            slots: vec![0; lookback],
            next: 0,
            filled: 0,
            sum: 0,
        })
    }

    /// Pushes a new total, evicting the oldest one when full, and returns the
    /// updated mean.
    pub fn push(&mut self, total: u64) -> f64 {
        if self.filled == self.slots.len() {
            self.sum -= u128::from(self.slots[self.next]);
        } else {
            self.filled += 1;
        }
        self.slots[self.next] = total;
        self.sum += u128::from(total);
        self.next = (self.next + 1) % self.slots.len();
        self.mean()
    }

    /// Returns the mean of the totals currently held, or `0.0` when empty.
    pub fn mean(&self) -> f64 {
        if self.filled == 0 {
            0.0
        } else {
            self.sum as f64 / self.filled as f64
        }
    }

    /// Number of totals currently held.
    pub fn len(&self) -> usize {
        self.filled
    }

    /// `true` until the first total is pushed.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Maximum number of totals held.
    pub fn lookback(&self) -> usize {
        self.slots.len()
    }
}
