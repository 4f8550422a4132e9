//! # LogListener — simple outcome printer
//!
//! A minimal listener that prints execution outcomes to stdout.
//! Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [success] task=task#12 handler="report" next_anchor=2024-01-20T09:00:00Z
//! [failure] task=task#12 handler="report" err="execution failed: boom"
//! ```

use async_trait::async_trait;

use crate::error::TaskError;
use crate::listeners::listener::TaskListener;
use crate::tasks::TaskDescriptor;

/// Outcome-printing listener.
#[derive(Default)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskListener for LogListener {
    async fn on_success(&self, task: &TaskDescriptor) {
        println!(
            "[success] task={} handler={:?} next_anchor={}",
            task.id(),
            task.handler(),
            task.schedule_time().to_rfc3339(),
        );
    }

    async fn on_failure(&self, task: &TaskDescriptor, error: &TaskError) {
        println!(
            "[failure] task={} handler={:?} err={:?}",
            task.id(),
            task.handler(),
            error.to_string(),
        );
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
