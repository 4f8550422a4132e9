//! Task model: descriptors, task bodies, and handler lookup.
//!
//! ## Contents
//! - [`TaskDescriptor`], [`TaskId`], [`Frequency`], [`MonthlyMode`], [`CatchUp`] —
//!   the schedulable unit and its recurrence/catch-up/expiry policy
//! - [`Runnable`], [`RunnableFn`], [`RunnableRef`] — the opaque task-body contract
//! - [`HandlerSet`] — keyed lookup table consulted by the registry at arm time

mod descriptor;
mod handlers;
mod runnable;

pub use descriptor::{CatchUp, Frequency, MonthlyMode, Properties, TaskDescriptor, TaskId};
pub use handlers::HandlerSet;
pub use runnable::{Runnable, RunnableFn, RunnableRef};
