//! Runtime core: registry and per-task timers.
//!
//! The public API from this module is [`Scheduler`] (plus its builder and the
//! introspection types); it owns the id→timer table, closes the
//! compute→arm→fire→recompute loop, and handles graceful shutdown.
//!
//! Internal modules:
//! - [`scheduler`]: the registry — load/cancel/execute-now/list, listener
//!   registration, id generation, shutdown with grace;
//! - [`timer`]: one armed alarm for one task (single arm/fire cycle);
//! - [`builder`]: dependency injection for clock, handlers and listeners.

mod builder;
mod scheduler;
mod timer;

pub use builder::SchedulerBuilder;
pub use scheduler::{Scheduler, TimerSnapshot};
pub use timer::TimerState;
