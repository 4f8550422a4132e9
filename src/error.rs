//! Error types used by the scheduler and by task bodies.
//!
//! This module defines two main error enums:
//!
//! - [`SchedulerError`] — errors raised by the scheduling runtime itself.
//! - [`TaskError`] — errors raised by individual task-body executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! Nothing in this crate is fatal to the process: the worst case is a single task
//! that stops producing further occurrences, which is observable via
//! [`Scheduler::list`](crate::Scheduler::list).

use std::time::Duration;
use thiserror::Error;

use crate::tasks::TaskId;

/// # Errors produced by the scheduling runtime.
///
/// These cover the failure classes of the registry:
/// - lookup errors (`cancel`/`execute_now` on an unknown id) — caller errors,
///   surfaced loudly;
/// - configuration errors (malformed descriptor, unknown handler) — reported
///   per-task during `load`, the task is skipped and loading continues;
/// - shutdown errors (grace period exceeded).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// No live timer exists for the given task id.
    #[error("unknown task id {id}")]
    UnknownTask {
        /// The id that was looked up.
        id: TaskId,
    },

    /// The descriptor is malformed (e.g. a timed frequency with a zero period).
    #[error("invalid descriptor for task {id}: {reason}")]
    InvalidDescriptor {
        /// The offending task id.
        id: TaskId,
        /// What is wrong with the descriptor.
        reason: String,
    },

    /// The descriptor names a handler that was never registered.
    #[error("no handler '{handler}' registered for task {id}")]
    UnknownHandler {
        /// The offending task id.
        id: TaskId,
        /// The handler key that failed to resolve.
        handler: String,
    },

    /// Shutdown grace period was exceeded; some firings were still running.
    #[error("shutdown grace {grace:?} exceeded; still running: {running:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of tasks whose firing had not completed in time.
        running: Vec<TaskId>,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chronovisor::{SchedulerError, TaskId};
    ///
    /// let err = SchedulerError::UnknownTask { id: TaskId(7) };
    /// assert_eq!(err.as_label(), "unknown_task");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::UnknownTask { .. } => "unknown_task",
            SchedulerError::InvalidDescriptor { .. } => "invalid_descriptor",
            SchedulerError::UnknownHandler { .. } => "unknown_handler",
            SchedulerError::GraceExceeded { .. } => "grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SchedulerError::UnknownTask { id } => format!("unknown task: {id}"),
            SchedulerError::InvalidDescriptor { id, reason } => {
                format!("invalid descriptor for {id}: {reason}")
            }
            SchedulerError::UnknownHandler { id, handler } => {
                format!("unknown handler '{handler}' for {id}")
            }
            SchedulerError::GraceExceeded { grace, running } => {
                format!("grace exceeded after {grace:?}; running tasks={running:?}")
            }
        }
    }
}

/// # Errors produced by task-body execution.
///
/// A failure outcome never stops recurrence: the task is rescheduled per its
/// normal rule, and the failure is reported through the listener fan-out.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task body returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The task body panicked; the panic was caught at the timer boundary.
    #[error("task body panicked: {info}")]
    Panicked {
        /// Panic payload, when it carried a string.
        info: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chronovisor::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }
}
