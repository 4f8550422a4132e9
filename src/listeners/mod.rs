//! Execution-outcome observers: trait and fan-out set.
//!
//! ## Contents
//! - [`TaskListener`] — per-execution observer contract (success/failure)
//! - [`ListenerSet`] — panic-isolated, sequential fan-out over all listeners
//! - [`LogListener`] — println-based demo listener (feature `logging`)
//!
//! ## Quick reference
//! - **Notifier**: the timer, after a firing completes and before the task is
//!   re-armed.
//! - **Registration**: [`Scheduler::add_listener`](crate::Scheduler::add_listener)
//!   / [`Scheduler::remove_listener`](crate::Scheduler::remove_listener).

mod listener;
mod set;

pub use listener::TaskListener;
pub use set::ListenerSet;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogListener;
