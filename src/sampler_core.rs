//! Core trait for sampler implementations.
//!
//! This module defines the unified trait call sites program against, so that
//! the adaptive sampler can be swapped for a fixed-rate or test double without
//! touching the instrumentation code.

/// The core trait implemented by all samplers.
///
/// All methods are called on the hot path: implementations must not block,
/// allocate or perform I/O.
///
/// > **Note:** calling `drop` through an `Arc` or `Box` resolves to the
/// > destructor of the smart pointer. Dereference first (`(*sampler).drop()`)
/// > or call through a `&dyn Sampler`.
pub trait Sampler: Send + Sync {
    /// Decides whether the current event should be kept.
    ///
    /// # Returns
    /// * `true` if the event is sampled
    /// * `false` if it should be discarded
    fn sample(&self) -> bool;

    /// Forces the current event to be kept.
    ///
    /// The event counts as both tested and sampled. Always returns `true`.
    fn keep(&self) -> bool;

    /// Forces the current event to be dropped.
    ///
    /// The event counts as tested only. Always returns `false`.
    fn drop(&self) -> bool;

    /// Returns the number of events tested over the sampler's lifetime.
    fn test_count(&self) -> u64;

    /// Returns the number of events sampled over the sampler's lifetime.
    fn sample_count(&self) -> u64;
}
