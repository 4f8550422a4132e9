//! Builder for constructing a [`Scheduler`] with injected dependencies.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::core::scheduler::Scheduler;
use crate::listeners::{ListenerSet, TaskListener};
use crate::tasks::{HandlerSet, RunnableRef};

/// Builder for a [`Scheduler`] instance.
///
/// Every dependency has a production default: the system clock, an empty
/// handler table, and no listeners. Tests typically swap the clock for
/// [`FixedClock`](crate::FixedClock).
///
/// # Example
/// ```
/// use chronovisor::{Properties, RunnableFn, Scheduler, SchedulerConfig, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = Scheduler::builder(SchedulerConfig::default())
///     .with_handler("ping", RunnableFn::arc("ping", |_props: Properties| async move {
///         Ok::<_, TaskError>(None)
///     }))
///     .build();
/// assert!(scheduler.is_empty().await);
/// # }
/// ```
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    clock: Arc<dyn Clock>,
    handlers: HandlerSet,
    listeners: Vec<Arc<dyn TaskListener>>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            clock: Arc::new(SystemClock),
            handlers: HandlerSet::new(),
            listeners: Vec::new(),
        }
    }

    /// Injects the wall-clock source (defaults to [`SystemClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a task body under `name`.
    ///
    /// Handlers can also be registered after construction via
    /// [`Scheduler::register_handler`].
    pub fn with_handler(mut self, name: impl Into<String>, runnable: RunnableRef) -> Self {
        self.handlers.register(name, runnable);
        self
    }

    /// Sets the initial execution-outcome listeners.
    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn TaskListener>>) -> Self {
        self.listeners = listeners;
        self
    }

    /// Builds the scheduler.
    pub fn build(self) -> Arc<Scheduler> {
        Scheduler::from_parts(
            self.cfg,
            self.clock,
            self.handlers,
            ListenerSet::with(self.listeners),
        )
    }
}
