//! error.rs
//! Error and result types for sampler construction and scheduling.
//!
//! The decision path (`sample`, `keep`, `drop`) is infallible; errors only
//! surface when a sampler is configured or wired to a scheduler.

use thiserror::Error as ThisError;

/// Result type for sampler construction and scheduling.
pub type Result<T> = std::result::Result<T, SamplerError>;

/// Errors raised while configuring or starting a sampler.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SamplerError {
    /// The window duration was zero.
    #[error("window duration must be greater than zero")]
    InvalidWindowDuration,

    /// The per-window sample target was zero.
    #[error("samples per window must be greater than 0")]
    InvalidSamplesPerWindow,

    /// The moving average lookback was zero.
    #[error("'average_lookback' must be at least 1, got {0}")]
    InvalidAverageLookback(usize),

    /// The budget lookback was zero.
    #[error("'budget_lookback' must be at least 1, got {0}")]
    InvalidBudgetLookback(usize),

    /// `start` was called on a sampler built without a scheduler.
    #[error("no window scheduler configured")]
    SchedulerMissing,

    /// The rollover task is already registered with a scheduler.
    #[error("sampler already started")]
    AlreadyStarted,

    /// The scheduler refused to register the rollover task.
    #[error("scheduler rejected rollover task: {0}")]
    SchedulerRejected(String),
}
