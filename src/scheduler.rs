//! Periodic triggers for window rollover.
//!
//! A sampler owns no thread. Rollover is driven by a [`WindowScheduler`]
//! supplied by the embedding system, which calls the registered task once per
//! window. Two schedulers ship with the crate:
//!
//! - [`ThreadScheduler`] - a dedicated background thread per task with
//!   fixed-rate deadlines.
//! - [`ManualScheduler`] - tasks run only when the owner calls
//!   [`run_pending`](ManualScheduler::run_pending), for tests and for hosts
//!   that already have a periodic loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SamplerError};

/// A periodic task. Returning `false` cancels it.
pub type RollTask = Box<dyn FnMut() -> bool + Send + 'static>;

/// External trigger that runs a task at a fixed rate.
///
/// Implementations must never run the same task concurrently with itself.
pub trait WindowScheduler: Send + Sync {
    /// Registers `task` to run every `period`, first run one period from now.
    ///
    /// The task keeps running until it returns `false` or the scheduler stops.
    fn schedule_at_fixed_rate(&self, period: Duration, task: RollTask) -> Result<()>;
}

/// Scheduler whose tasks only run when [`run_pending`](Self::run_pending) is
/// called.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use adaptive_sampler_core::scheduler::{ManualScheduler, WindowScheduler};
///
/// let scheduler = ManualScheduler::new();
/// let mut runs = 0;
/// scheduler
///     .schedule_at_fixed_rate(Duration::from_secs(1), Box::new(move || {
///         runs += 1;
///         runs < 2
///     }))
///     .unwrap();
///
/// assert_eq!(scheduler.run_pending(), 1);
/// assert_eq!(scheduler.run_pending(), 1); // task cancels itself here
/// assert_eq!(scheduler.run_pending(), 0);
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<ManualTask>>,
}

struct ManualTask {
    period: Duration,
    task: RollTask,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every registered task once, dropping the ones that cancel.
    ///
    /// Returns the number of tasks that ran.
    pub fn run_pending(&self) -> usize {
        // Run outside the lock so tasks may register new tasks
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let ran = tasks.len();
        tasks.retain_mut(|entry| (entry.task)());

        let mut registered = self.tasks.lock();
        tasks.append(&mut registered);
        *registered = tasks;
        ran
    }

    /// Number of live tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Periods of the live tasks, in registration order.
    pub fn periods(&self) -> Vec<Duration> {
        self.tasks.lock().iter().map(|entry| entry.period).collect()
    }
}

impl WindowScheduler for ManualScheduler {
    fn schedule_at_fixed_rate(&self, period: Duration, task: RollTask) -> Result<()> {
        self.tasks.lock().push(ManualTask { period, task });
        Ok(())
    }
}

struct Shared {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

/// Runs each registered task on its own named background thread.
///
/// Deadlines advance by exactly one period per run. When a run overruns one
/// or more deadlines, the missed ones are skipped rather than replayed back to
/// back, so a stalled host does not produce a burst of empty windows.
///
/// Dropping the scheduler stops and joins all of its threads.
pub struct ThreadScheduler {
    name: String,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadScheduler {
    /// Creates a scheduler; worker threads are named `"{name}-{index}"`.
    pub fn new(name: impl Into<String>) -> Self {
        ThreadScheduler {
            name: name.into(),
            shared: Arc::new(Shared {
                stopped: Mutex::new(false),
                wakeup: Condvar::new(),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Stops all tasks and waits for their threads to exit.
    ///
    /// A task that is running finishes its current run first.
    pub fn shutdown(&self) {
        *self.shared.stopped.lock() = true;
        self.shared.wakeup.notify_all();

        let current = thread::current().id();
        for handle in self.handles.lock().drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    /// `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        *self.shared.stopped.lock()
    }
}

impl WindowScheduler for ThreadScheduler {
    fn schedule_at_fixed_rate(&self, period: Duration, task: RollTask) -> Result<()> {
        if period.is_zero() {
            return Err(SamplerError::SchedulerRejected(
                "period must be greater than zero".to_owned(),
            ));
        }
        if self.is_shutdown() {
            return Err(SamplerError::SchedulerRejected(format!(
                "scheduler '{}' is shut down",
                self.name
            )));
        }

        let mut handles = self.handles.lock();
        let thread_name = format!("{}-{}", self.name, handles.len());
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_at_fixed_rate(&shared, period, task))
            .map_err(|e| SamplerError::SchedulerRejected(e.to_string()))?;
        handles.push(handle);

        info!("scheduled task on '{}' every {:?}", thread_name, period);
        Ok(())
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_at_fixed_rate(shared: &Shared, period: Duration, mut task: RollTask) {
    let mut deadline = Instant::now() + period;
    loop {
        {
            let mut stopped = shared.stopped.lock();
            while !*stopped {
                if shared.wakeup.wait_until(&mut stopped, deadline).timed_out() {
                    break;
                }
            }
            if *stopped {
                return;
            }
        }

        if !task() {
            debug!("periodic task cancelled itself");
            return;
        }

        deadline += period;
        let now = Instant::now();
        if deadline <= now {
            let behind = now.duration_since(deadline).as_nanos() / period.as_nanos();
            deadline += period * (behind as u32 + 1);
        }
    }
}
