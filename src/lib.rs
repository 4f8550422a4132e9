//! # chronovisor
//!
//! **Chronovisor** is a calendar-aware recurring-task scheduler for Rust.
//!
//! Given task descriptors (one-shot or recurring, with catch-up and expiry
//! policy), it computes each task's next execution instant, arms a per-task
//! timer, executes the task body when the timer fires, records the outcome,
//! and re-arms for the next occurrence. The crate is designed as a building
//! block: persistence, handler logic and telemetry stay with the caller.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌────────────────┐   ┌────────────────┐   ┌────────────────┐
//!     │ TaskDescriptor │   │ TaskDescriptor │   │ TaskDescriptor │
//!     │  (user task 1) │   │  (user task 2) │   │  (user task 3) │
//!     └───────┬────────┘   └───────┬────────┘   └───────┬────────┘
//!             ▼                    ▼                    ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Scheduler (registry)                                            │
//! │  - id → live TaskTimer table (at most one per id)                │
//! │  - HandlerSet (keyed task-body lookup)                           │
//! │  - ListenerSet (success/failure fan-out)                         │
//! │  - Clock (injected; FixedClock under test)                       │
//! └───────┬──────────────────┬──────────────────┬────────────────────┘
//!         ▼                  ▼                  ▼
//!   ┌────────────┐     ┌────────────┐     ┌────────────┐
//!   │ TaskTimer  │     │ TaskTimer  │     │ TaskTimer  │
//!   │ (one cycle)│     │ (one cycle)│     │ (one cycle)│
//!   └─────┬──────┘     └─────┬──────┘     └─────┬──────┘
//!         │ fire: run body → record outcome → notify listeners
//!         └───────────────► Scheduler::reprocess ───────────────┐
//!                                                               │
//!                     recurrence::next_execution(task, now) ◄───┘
//!                     (pure calendar math: TIMED / DAILY /
//!                      MONTHLY by day or Nth weekday, catch-up
//!                      windows, stop-date expiry)
//! ```
//!
//! ### Lifecycle
//! ```text
//! load(task) ──► next_execution(task, now)
//!    ├─ none           ──► task retires (no timer armed)
//!    └─ Some(instant)  ──► TaskTimer armed (Scheduled)
//!                             │ alarm fires (cancel pre-empts the sleep)
//!                             ▼
//!                          Running: body executes, errors/panics caught
//!                             ▼
//!                          Stopped: last_execution := now,
//!                                   schedule_time := fired instant,
//!                                   properties replaced when returned
//!                             ▼
//!                          listeners notified (panic-isolated)
//!                             ▼
//!                          reprocess ──► next_execution(...) ──► new timer | retire
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types / traits                        |
//! |-----------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Tasks**       | Describe one-shot/recurring tasks with catch-up and expiry.   | [`TaskDescriptor`], [`Frequency`], [`CatchUp`] |
//! | **Bodies**      | Opaque task-body contract, keyed handler lookup.              | [`Runnable`], [`RunnableFn`], [`HandlerSet`] |
//! | **Recurrence**  | Pure next-occurrence math, calendar-aware.                    | [`recurrence::next_execution`]            |
//! | **Registry**    | Load/cancel/execute-now/list, one live timer per id.          | [`Scheduler`], [`TimerSnapshot`]          |
//! | **Listeners**   | Per-execution success/failure fan-out, panic-isolated.        | [`TaskListener`]                          |
//! | **Errors**      | Typed errors for the runtime and task executions.             | [`SchedulerError`], [`TaskError`]         |
//! | **Clock**       | Injected time source for deterministic tests.                 | [`Clock`], [`SystemClock`], [`FixedClock`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogListener`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use chrono::{Duration, Utc};
//! use chronovisor::{
//!     CatchUp, Frequency, Properties, RunnableFn, Scheduler, SchedulerConfig,
//!     TaskDescriptor, TaskError,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Scheduler::builder(SchedulerConfig::default())
//!         .with_handler("greet", RunnableFn::arc("greet", |props: Properties| async move {
//!             println!("hello, {}!", props.get("name").map(String::as_str).unwrap_or("world"));
//!             Ok::<_, TaskError>(None)
//!         }))
//!         .build();
//!
//!     let mut props = Properties::new();
//!     props.insert("name".into(), "chronovisor".into());
//!
//!     // Due one second ago; CatchUp::Always makes it fire immediately.
//!     let task = TaskDescriptor::new(
//!         scheduler.generate_id(),
//!         "greet",
//!         Utc::now() - Duration::seconds(1),
//!     )
//!     .with_frequency(Frequency::Once)
//!     .with_catch_up(CatchUp::Always)
//!     .with_properties(props);
//!
//!     let errors = scheduler.load(vec![task]).await;
//!     assert!(errors.is_empty());
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod clock;
mod config;
mod core;
mod error;
mod listeners;
pub mod recurrence;
mod tasks;

// ---- Public re-exports ----

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SchedulerConfig;
pub use core::{Scheduler, SchedulerBuilder, TimerSnapshot, TimerState};
pub use error::{SchedulerError, TaskError};
pub use listeners::{ListenerSet, TaskListener};
pub use tasks::{
    CatchUp, Frequency, HandlerSet, MonthlyMode, Properties, Runnable, RunnableFn, RunnableRef,
    TaskDescriptor, TaskId,
};

// Optional: expose a simple built-in outcome logger (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogListener;
