//! An adaptive sampling library for telemetry and instrumentation agents.
//!
//! The sampler decides, for every observed event, whether to keep it (capture
//! a stack trace, emit a record, ...) or drop it, while holding the long-run
//! number of kept events close to a per-window target even when the incoming
//! rate fluctuates. Decisions are lock-free and safe to make from any number
//! of threads.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use adaptive_sampler_core::samplers::{AdaptiveSamplerCore, AdaptiveSamplerCoreConfig};
//!
//! // Aim for 100 samples per 1s window, averaging the rate over 30 windows
//! // and carrying unused budget over 16 windows
//! let config = AdaptiveSamplerCoreConfig::new(Duration::from_secs(1), 100, 30, 16);
//! let sampler = AdaptiveSamplerCore::new(config).unwrap();
//!
//! if sampler.sample() {
//!     println!("event sampled");
//! }
//!
//! // Normally called by a scheduler once per window
//! sampler.roll_window();
//! ```
//!
//! # Core Concepts
//!
//! ## Windows
//! Time is divided into windows of constant duration. The sampler owns no
//! thread: a [`WindowScheduler`](scheduler::WindowScheduler) supplied by the
//! host calls the rollover once per window. [`ThreadScheduler`](scheduler::ThreadScheduler)
//! and [`ManualScheduler`](scheduler::ManualScheduler) cover the common cases.
//!
//! ## Budget
//! Each window has a budget of samples. Windows that under-sample leave budget
//! for the following ones, over-sampling windows reduce it. See
//! [`BudgetPool`](budget::BudgetPool).
//!
//! ## Forced decisions
//! [`keep`](samplers::AdaptiveSamplerCore::keep) and
//! [`drop`](samplers::AdaptiveSamplerCore::drop) bypass the probability but
//! still update the statistics, so forced events shape later decisions.
//!
//! ## Error Handling
//! Sampling never fails. Construction and scheduling return [`Result`] with a
//! [`SamplerError`] for invalid configuration or scheduler problems.
//!
//! ## Logging
//! The crate logs through the [`log`] facade and never installs a logger.
//! Nothing is logged on the sampling path.

pub mod budget;
pub mod counters;
pub mod error;
pub mod listener;
pub mod moving_average;
pub mod random;
pub mod sampler_core;
pub mod samplers;
pub mod scheduler;

pub use counters::CountsSnapshot;
pub use error::{Result, SamplerError};
pub use listener::{WindowListener, WindowStats};
pub use random::{RandomSource, SeededRandom, ThreadLocalRandom};
pub use sampler_core::Sampler;
pub use samplers::{AdaptiveSamplerCore, AdaptiveSamplerCoreConfig};
pub use scheduler::{ManualScheduler, ThreadScheduler, WindowScheduler};
