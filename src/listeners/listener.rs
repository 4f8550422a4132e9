//! # Execution-outcome listener trait.
//!
//! Provides [`TaskListener`], the extension point for observing task
//! executions (auditing, metrics, alerting, chaining).
//!
//! ## Rules
//! - Listeners are invoked after the firing completes, before the task is
//!   re-armed, so a listener observes a settled descriptor.
//! - A listener that panics is caught and reported; remaining listeners are
//!   still notified and the scheduler is unaffected.
//! - Keep handlers quick; a slow listener delays re-arming of the task whose
//!   outcome it is observing (executions for one id are strictly sequential).

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::TaskDescriptor;

/// Observer of per-execution outcomes.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use chronovisor::{TaskDescriptor, TaskError, TaskListener};
///
/// struct Audit;
///
/// #[async_trait]
/// impl TaskListener for Audit {
///     async fn on_success(&self, task: &TaskDescriptor) {
///         let _ = task.id();
///     }
///
///     async fn on_failure(&self, task: &TaskDescriptor, error: &TaskError) {
///         let _ = (task.id(), error.as_label());
///     }
///
///     fn name(&self) -> &'static str { "audit" }
/// }
/// ```
#[async_trait]
pub trait TaskListener: Send + Sync + 'static {
    /// Called when a firing completed successfully.
    async fn on_success(&self, task: &TaskDescriptor);

    /// Called when a firing failed (task-body error or panic).
    async fn on_failure(&self, task: &TaskDescriptor, error: &TaskError);

    /// Returns the listener name used for removal and panic reports.
    ///
    /// Prefer short, descriptive names (e.g., "audit", "metrics", "slack").
    /// The default uses `type_name::<Self>()`, which can be verbose — override
    /// it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
