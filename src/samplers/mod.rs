//! Sampler algorithm implementations.
//!
//! Each sampler is a thread-safe, low-level core that call sites use through
//! the [`Sampler`](crate::sampler_core::Sampler) trait or directly.
//!
//! # Available Algorithms
//!
//! - **[`AdaptiveSamplerCore`]** - Windowed probabilistic sampler that tunes its
//!   probability once per window to hold a target number of samples
//!
//! # Thread Safety
//!
//! Sampling decisions are lock-free. Window maintenance is serialized
//! internally and never blocks sampling callers.

pub mod adaptive_sampler_core;
pub use adaptive_sampler_core::AdaptiveSamplerCore;
pub use adaptive_sampler_core::AdaptiveSamplerCoreBuilder;
pub use adaptive_sampler_core::AdaptiveSamplerCoreConfig;
pub use adaptive_sampler_core::WindowState;
