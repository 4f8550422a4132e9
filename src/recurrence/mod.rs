//! Pure recurrence math: next-occurrence calculation and calendar helpers.
//!
//! ## Contents
//! - [`next_execution`] — `f(task, now) → Option<instant>`, the single entry
//!   point the registry calls before arming a timer
//! - `calendar` (private) — day/month advances, month lengths, Nth-weekday
//!   resolution with the step-back rule
//!
//! Everything here is deterministic and side-effect free; "now" is injected by
//! the caller, sampled once per pass.

mod calculator;
pub(crate) mod calendar;

pub use calculator::next_execution;
