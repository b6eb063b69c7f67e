use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::budget::BudgetPool;
use crate::counters::{CountsSnapshot, RunningCounters, WindowCounts};
use crate::error::{Result, SamplerError};
use crate::listener::{self, WindowListener, WindowStats};
use crate::moving_average::MovingAverage;
use crate::random::{RandomSource, ThreadLocalRandom};
use crate::sampler_core::Sampler;
use crate::scheduler::{RollTask, WindowScheduler};

/// Core implementation of the adaptive windowed sampling algorithm.
///
/// The sampler divides time into windows of constant duration and aims for a
/// fixed number of samples per window, scattered uniformly among the events
/// seen in that window. Each event is kept with the probability published by
/// the last window rollover. When a window ends, the observed event count and
/// the number of samples taken feed the estimate used for the next window.
///
/// # Algorithm Behavior
///
/// - Every call to [`sample`](Self::sample) counts as a test; it is kept when a
///   uniform draw falls below the current probability and the window has not
///   yet used up its budget
/// - At each rollover the window's test count is pushed into a moving average
///   of `average_lookback` windows (`total_average`)
/// - The window's sample count updates the budget carried over
///   `budget_lookback` windows; under-sampled windows leave budget for later
/// - The next probability is `min(1, budget / total_average)`, or `1` while no
///   events have been seen
///
/// Before the first rollover the probability is `1` and the budget is the
/// warm-up allowance `samples_per_window * (budget_lookback + 1)`.
///
/// # Thread Safety
///
/// [`sample`](Self::sample), [`keep`](Self::keep) and [`drop`](Self::drop) are
/// lock-free and never block. The window statistics are published as one
/// immutable snapshot, so callers never see a probability paired with a
/// stale average. [`roll_window`](Self::roll_window) is serialized internally
/// and may run while other threads are sampling.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use adaptive_sampler_core::samplers::{AdaptiveSamplerCore, AdaptiveSamplerCoreConfig};
///
/// // Aim for 2 samples per 1s window, no smoothing
/// let config = AdaptiveSamplerCoreConfig::new(Duration::from_secs(1), 2, 1, 1);
/// let sampler = AdaptiveSamplerCore::new(config).unwrap();
///
/// assert!(sampler.keep());
/// assert!(!sampler.drop());
///
/// let stats = sampler.roll_window();
/// assert_eq!((stats.window_tests, stats.window_samples), (2, 1));
/// assert_eq!(stats.budget, 1);
/// assert_eq!(stats.probability, 0.5);
/// ```
pub struct AdaptiveSamplerCore {
    /// Immutable configuration
    config: AdaptiveSamplerCoreConfig,
    /// Lifetime and window counters updated by caller threads
    counters: RunningCounters,
    /// Window statistics published by the last rollover
    published: ArcSwap<WindowState>,
    /// State owned by the rollover
    rollover: Mutex<RolloverState>,
    random: Box<dyn RandomSource>,
    listener: Option<Box<dyn WindowListener>>,
    scheduler: Option<Arc<dyn WindowScheduler>>,
    /// Set once the rollover task is registered
    started: AtomicBool,
    created: Instant,
    rollovers: AtomicU64,
    /// Nanoseconds between `created` and the last rollover
    last_rollover_nanos: AtomicU64,
}

/// Internal state of the rollover
struct RolloverState {
    average: MovingAverage,
    budget: BudgetPool,
}

/// Values published by a rollover and read by every sampling call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    /// Smoothed number of events per window
    pub total_average: f64,
    /// Samples available to the current window
    pub budget: u64,
    /// Probability of keeping an event, in `[0, 1]`
    pub probability: f64,
}

impl AdaptiveSamplerCore {
    /// Creates a sampler with a thread-local random source, no listener and
    /// no scheduler.
    ///
    /// Rollover must be driven by calling [`roll_window`](Self::roll_window).
    /// Use [`builder`](Self::builder) to attach collaborators.
    ///
    /// # Errors
    /// Returns the first validation error of `config`, see
    /// [`AdaptiveSamplerCoreConfig::validate`].
    pub fn new(config: AdaptiveSamplerCoreConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Starts building a sampler from `config`.
    pub fn builder(config: AdaptiveSamplerCoreConfig) -> AdaptiveSamplerCoreBuilder {
        AdaptiveSamplerCoreBuilder {
            config,
            random: None,
            listener: None,
            scheduler: None,
        }
    }

    /// Decides whether the current event is sampled.
    ///
    /// # Returns
    /// * `true` if the event is kept
    /// * `false` if the draw missed, or the window already used its budget
    ///   (when [`budget_cap`](AdaptiveSamplerCoreConfig::budget_cap) is on)
    #[inline]
    pub fn sample(&self) -> bool {
        self.counters.record_test();
        let state = self.published.load();
        if self.random.next_f64() < state.probability {
            if self.config.budget_cap {
                self.counters.try_record_sample(state.budget)
            } else {
                self.counters.record_sample();
                true
            }
        } else {
            false
        }
    }

    /// Keeps the current event regardless of probability and budget.
    ///
    /// The event still counts towards the window's samples, so it consumes
    /// budget for the following windows. Always returns `true`.
    #[inline]
    pub fn keep(&self) -> bool {
        self.counters.record_test();
        self.counters.record_sample();
        true
    }

    /// Drops the current event regardless of probability.
    ///
    /// The event counts towards the observed rate but consumes no budget.
    /// Always returns `false`.
    #[inline]
    pub fn drop(&self) -> bool {
        self.counters.record_test();
        false
    }

    /// Closes the current window and publishes the statistics for the next.
    ///
    /// Normally invoked by the scheduler once per window. Concurrent calls are
    /// serialized. The listener, if any, is notified after the new state is
    /// published; a panicking listener is logged and ignored.
    ///
    /// # Returns
    /// The statistics delivered to the listener.
    pub fn roll_window(&self) -> WindowStats {
        let stats = {
            let mut rollover = self.rollover.lock();
            let window = self.counters.take_window();

            let total_average = rollover.average.push(window.tests);
            let budget = rollover.budget.consume(window.samples);
            let probability = probability_for(budget, total_average);

            self.published.store(Arc::new(WindowState {
                total_average,
                budget,
                probability,
            }));

            if self.is_degraded() {
                warn!(
                    "window rollover resumed after more than {:?} without one",
                    self.degraded_after()
                );
            }
            let since_created = u64::try_from(self.created.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.last_rollover_nanos.store(since_created, Ordering::Release);
            self.rollovers.fetch_add(1, Ordering::AcqRel);

            WindowStats {
                window_tests: window.tests,
                window_samples: window.samples,
                budget,
                total_average,
                probability,
            }
        };

        debug!(
            "window rolled: tests={}, samples={}, budget={}, average={:.2}, probability={:.4}",
            stats.window_tests,
            stats.window_samples,
            stats.budget,
            stats.total_average,
            stats.probability
        );
        if let Some(listener) = &self.listener {
            listener::notify(listener.as_ref(), &stats);
        }
        stats
    }

    /// Registers the rollover with the configured scheduler.
    ///
    /// The scheduled task only holds a weak reference: once the last `Arc` to
    /// the sampler is dropped, the task cancels itself.
    ///
    /// # Errors
    /// * [`SamplerError::SchedulerMissing`] if the sampler was built without a scheduler
    /// * [`SamplerError::AlreadyStarted`] if the rollover is already registered
    /// * Any error returned by the scheduler
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let scheduler = self.scheduler.as_ref().ok_or(SamplerError::SchedulerMissing)?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SamplerError::AlreadyStarted);
        }

        let sampler = Arc::downgrade(self);
        let task: RollTask = Box::new(move || match sampler.upgrade() {
            Some(sampler) => {
                sampler.roll_window();
                true
            }
            None => {
                warn!("sampler dropped, cancelling its window rollover");
                false
            }
        });

        if let Err(e) = scheduler.schedule_at_fixed_rate(self.config.window_duration, task) {
            self.started.store(false, Ordering::Release);
            return Err(e);
        }
        info!(
            "adaptive sampler started: window={:?}, samples_per_window={}",
            self.config.window_duration, self.config.samples_per_window
        );
        Ok(())
    }

    /// `true` once the rollover is registered with a scheduler.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Returns the lifetime number of tested events.
    #[inline]
    pub fn test_count(&self) -> u64 {
        self.counters.test_count()
    }

    /// Returns the lifetime number of sampled events.
    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.counters.sample_count()
    }

    /// Returns both lifetime counters, with `tests >= samples`.
    pub fn counts(&self) -> CountsSnapshot {
        self.counters.counts()
    }

    /// Returns the totals of the window in progress.
    pub fn window_counts(&self) -> WindowCounts {
        self.counters.window()
    }

    /// Returns the state published by the last rollover.
    pub fn state(&self) -> WindowState {
        **self.published.load()
    }

    /// Current sampling probability.
    #[inline]
    pub fn probability(&self) -> f64 {
        self.published.load().probability
    }

    /// Number of rollovers performed so far.
    pub fn rollover_count(&self) -> u64 {
        self.rollovers.load(Ordering::Acquire)
    }

    /// Time between construction and the last rollover, `None` before the
    /// first one.
    pub fn last_rollover(&self) -> Option<Duration> {
        if self.rollover_count() == 0 {
            None
        } else {
            Some(Duration::from_nanos(self.last_rollover_nanos.load(Ordering::Acquire)))
        }
    }

    /// `true` when no rollover happened for more than two window durations.
    ///
    /// A degraded sampler keeps using the last published state; if it never
    /// rolled, that is probability `1` with the warm-up budget.
    pub fn is_degraded(&self) -> bool {
        let since_last = self
            .created
            .elapsed()
            .saturating_sub(self.last_rollover().unwrap_or(Duration::ZERO));
        since_last > self.degraded_after()
    }

    /// Configuration the sampler was built with.
    pub fn config(&self) -> &AdaptiveSamplerCoreConfig {
        &self.config
    }

    #[inline]
    fn degraded_after(&self) -> Duration {
        self.config.window_duration.saturating_mul(2)
    }
}

impl Sampler for AdaptiveSamplerCore {
    #[inline(always)]
    fn sample(&self) -> bool {
        self.sample()
    }

    #[inline(always)]
    fn keep(&self) -> bool {
        self.keep()
    }

    #[inline(always)]
    fn drop(&self) -> bool {
        AdaptiveSamplerCore::drop(self)
    }

    #[inline(always)]
    fn test_count(&self) -> u64 {
        self.test_count()
    }

    #[inline(always)]
    fn sample_count(&self) -> u64 {
        self.sample_count()
    }
}

fn probability_for(budget: u64, total_average: f64) -> f64 {
    if total_average > 0.0 {
        (budget as f64 / total_average).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Configuration structure for creating an `AdaptiveSamplerCore`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdaptiveSamplerCoreConfig {
    /// Length of one sampling window.
    pub window_duration: Duration,
    /// Target number of samples per window.
    pub samples_per_window: u64,
    /// Number of windows averaged into the event rate estimate.
    pub average_lookback: usize,
    /// Number of windows the sampling budget is carried across.
    pub budget_lookback: usize,
    /// Register the rollover with the scheduler as soon as the sampler is
    /// built with [`AdaptiveSamplerCoreBuilder::build_shared`]. When `false`,
    /// call [`AdaptiveSamplerCore::start`] or drive
    /// [`AdaptiveSamplerCore::roll_window`] yourself.
    pub auto_start: bool,
    /// Stop accepting through `sample` once the window used its budget.
    /// When `false`, only the probability decides, and a sampler whose
    /// scheduler never fires keeps every event.
    pub budget_cap: bool,
}

impl AdaptiveSamplerCoreConfig {
    /// Creates a configuration with `auto_start` and `budget_cap` enabled.
    pub fn new(
        window_duration: Duration,
        samples_per_window: u64,
        average_lookback: usize,
        budget_lookback: usize,
    ) -> Self {
        Self {
            window_duration,
            samples_per_window,
            average_lookback,
            budget_lookback,
            auto_start: true,
            budget_cap: true,
        }
    }

    /// Checks that every duration, target and lookback is positive.
    pub fn validate(&self) -> Result<()> {
        if self.window_duration.is_zero() {
            return Err(SamplerError::InvalidWindowDuration);
        }
        if self.samples_per_window == 0 {
            return Err(SamplerError::InvalidSamplesPerWindow);
        }
        if self.average_lookback == 0 {
            return Err(SamplerError::InvalidAverageLookback(self.average_lookback));
        }
        if self.budget_lookback == 0 {
            return Err(SamplerError::InvalidBudgetLookback(self.budget_lookback));
        }
        Ok(())
    }
}

impl TryFrom<AdaptiveSamplerCoreConfig> for AdaptiveSamplerCore {
    type Error = SamplerError;

    /// Converts a configuration into a sampler with default collaborators.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use adaptive_sampler_core::samplers::{AdaptiveSamplerCore, AdaptiveSamplerCoreConfig};
    ///
    /// let sampler: AdaptiveSamplerCore =
    ///     AdaptiveSamplerCoreConfig::new(Duration::from_secs(1), 100, 30, 16)
    ///         .try_into()
    ///         .unwrap();
    /// assert_eq!(sampler.probability(), 1.0);
    /// ```
    fn try_from(config: AdaptiveSamplerCoreConfig) -> Result<Self> {
        AdaptiveSamplerCore::new(config)
    }
}

/// Builder attaching collaborators to an [`AdaptiveSamplerCore`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use adaptive_sampler_core::random::SeededRandom;
/// use adaptive_sampler_core::scheduler::ManualScheduler;
/// use adaptive_sampler_core::samplers::{AdaptiveSamplerCore, AdaptiveSamplerCoreConfig};
///
/// let scheduler = Arc::new(ManualScheduler::new());
/// let sampler = AdaptiveSamplerCore::builder(
///     AdaptiveSamplerCoreConfig::new(Duration::from_secs(1), 100, 30, 16),
/// )
/// .random(SeededRandom::new(42))
/// .listener(|stats: &adaptive_sampler_core::WindowStats| println!("{:?}", stats))
/// .scheduler(scheduler.clone())
/// .build_shared()
/// .unwrap();
///
/// sampler.sample();
/// scheduler.run_pending(); // one rollover
/// assert_eq!(sampler.rollover_count(), 1);
/// ```
pub struct AdaptiveSamplerCoreBuilder {
    config: AdaptiveSamplerCoreConfig,
    random: Option<Box<dyn RandomSource>>,
    listener: Option<Box<dyn WindowListener>>,
    scheduler: Option<Arc<dyn WindowScheduler>>,
}

impl AdaptiveSamplerCoreBuilder {
    /// Uses `random` for sampling draws instead of [`ThreadLocalRandom`].
    pub fn random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Some(Box::new(random));
        self
    }

    /// Notifies `listener` at construction and after every rollover.
    pub fn listener(mut self, listener: impl WindowListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Uses `scheduler` to trigger rollovers.
    pub fn scheduler<S: WindowScheduler + 'static>(mut self, scheduler: Arc<S>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Builds the sampler without registering it with the scheduler.
    ///
    /// The listener receives the initial state before this returns.
    pub fn build(self) -> Result<AdaptiveSamplerCore> {
        self.config.validate()?;
        let average = MovingAverage::new(self.config.average_lookback)?;
        let budget = BudgetPool::new(self.config.samples_per_window, self.config.budget_lookback)?;

        let initial = WindowState {
            total_average: average.mean(),
            budget: budget.budget(),
            probability: 1.0,
        };
        if let Some(listener) = &self.listener {
            listener::notify(
                listener.as_ref(),
                &WindowStats {
                    window_tests: 0,
                    window_samples: 0,
                    budget: initial.budget,
                    total_average: initial.total_average,
                    probability: initial.probability,
                },
            );
        }

        Ok(AdaptiveSamplerCore {
            config: self.config,
            counters: RunningCounters::new(),
            published: ArcSwap::from_pointee(initial),
            rollover: Mutex::new(RolloverState { average, budget }),
            random: self.random.unwrap_or_else(|| Box::new(ThreadLocalRandom::new())),
            listener: self.listener,
            scheduler: self.scheduler,
            started: AtomicBool::new(false),
            created: Instant::now(),
            rollovers: AtomicU64::new(0),
            last_rollover_nanos: AtomicU64::new(0),
        })
    }

    /// Builds a shared sampler and, when
    /// [`auto_start`](AdaptiveSamplerCoreConfig::auto_start) is set, registers
    /// its rollover with the scheduler.
    ///
    /// # Errors
    /// Validation errors, [`SamplerError::SchedulerMissing`] when `auto_start`
    /// is set without a scheduler, or the scheduler's own error.
    pub fn build_shared(self) -> Result<Arc<AdaptiveSamplerCore>> {
        let sampler = Arc::new(self.build()?);
        if sampler.config.auto_start {
            sampler.start()?;
        }
        Ok(sampler)
    }
}
