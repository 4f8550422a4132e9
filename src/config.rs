//! # Global runtime configuration.
//!
//! Provides [`SchedulerConfig`], the centralized settings for the scheduler runtime.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `grace = 0s` → no wait on shutdown, in-flight firings are abandoned immediately

use std::time::Duration;

/// Global configuration for the scheduler runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for in-flight firings during [`Scheduler::shutdown`](crate::Scheduler::shutdown)
/// - `max_concurrent`: cap on simultaneously firing tasks (`0` = unlimited)
///
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum time to wait for in-flight firings to complete during shutdown.
    ///
    /// When `shutdown()` is called:
    /// - Scheduled timers are cancelled via their `CancellationToken`
    /// - The scheduler waits up to `grace` for running firings to finish
    /// - If the timeout is exceeded, `SchedulerError::GraceExceeded` is returned
    pub grace: Duration,

    /// Maximum number of task firings allowed to run simultaneously.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` task bodies execute at once
    ///
    /// Applied globally across all tasks in the scheduler. A due timer whose
    /// permit is unavailable waits; its firing is delayed, not dropped.
    pub max_concurrent: usize,
}

impl SchedulerConfig {
    /// Returns the global concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent firings
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `grace = 60s` (reasonable graceful shutdown window)
    /// - `max_concurrent = 0` (unlimited)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            max_concurrent: 0,
        }
    }
}
