//! # TaskTimer: one armed alarm for one task.
//!
//! A [`TaskTimer`] owns a single arm/fire cycle for one task. The registry
//! creates a fresh instance per cycle; an instance is never re-armed.
//!
//! ## State machine
//! ```text
//! Scheduled ──(alarm fires)──► Running ──(body + listeners done)──► Stopped
//!     │
//!     └──(cancel / shutdown)──► Stopped   (body never runs)
//! ```
//!
//! ## Firing sequence
//! ```text
//! sleep until target (skipped when immediate)
//!   ├─► acquire global permit (optional, cancellable)
//!   ├─► state := Running
//!   ├─► run task body (errors and panics caught, classified as failure)
//!   ├─► descriptor.record_execution(fired_target, clock.now(), new_props)
//!   ├─► state := Stopped
//!   ├─► listeners.notify_success / notify_failure
//!   └─► scheduler.reprocess(descriptor, generation)   (re-arm is the LAST step)
//! ```
//!
//! ## Rules
//! - Cancellation pre-empts the sleep and the permit wait; the body never runs.
//! - Once the body has started, cancellation has no effect on the in-flight
//!   run (fire-and-forget): it only suppresses future firings.
//! - Re-arm happens after listener notification, so executions for one id are
//!   strictly sequential.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::core::scheduler::Scheduler;
use crate::error::TaskError;
use crate::listeners::ListenerSet;
use crate::tasks::{Properties, Runnable, RunnableRef, TaskDescriptor};

/// Lifecycle state of a timer, readable through
/// [`Scheduler::list`](crate::Scheduler::list).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    /// Armed; the alarm has not fired yet.
    Scheduled = 0,
    /// The task body is executing.
    Running = 1,
    /// Fired and completed, or cancelled before firing.
    Stopped = 2,
}

impl TimerState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => TimerState::Scheduled,
            1 => TimerState::Running,
            _ => TimerState::Stopped,
        }
    }
}

/// Single-use timer for one task: sleeps until the target instant, executes
/// the task body, records the outcome, and hands the updated descriptor back
/// to the registry.
pub(crate) struct TaskTimer {
    descriptor: TaskDescriptor,
    runnable: RunnableRef,
    /// Computed occurrence this alarm fires for; `None` only for an immediate
    /// fire of a task the calculator already retired (the anchor is then left
    /// untouched).
    target: Option<DateTime<Utc>>,
    run_immediately: bool,
    clock: Arc<dyn Clock>,
    listeners: Arc<ListenerSet>,
    semaphore: Option<Arc<Semaphore>>,
    /// Shared with the registry handle for `list()` snapshots.
    state: Arc<AtomicU8>,
}

impl TaskTimer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        descriptor: TaskDescriptor,
        runnable: RunnableRef,
        target: Option<DateTime<Utc>>,
        run_immediately: bool,
        clock: Arc<dyn Clock>,
        listeners: Arc<ListenerSet>,
        semaphore: Option<Arc<Semaphore>>,
        state: Arc<AtomicU8>,
    ) -> Self {
        state.store(TimerState::Scheduled as u8, Ordering::SeqCst);
        Self {
            descriptor,
            runnable,
            target,
            run_immediately,
            clock,
            listeners,
            semaphore,
            state,
        }
    }

    /// Runs the single arm/fire cycle.
    ///
    /// `generation` identifies this timer inside the registry; a stale timer
    /// (replaced or cancelled while firing) is dropped on re-arm instead of
    /// double-scheduling.
    pub(crate) async fn run(
        mut self,
        token: CancellationToken,
        scheduler: Weak<Scheduler>,
        generation: u64,
    ) {
        if !self.run_immediately {
            if let Some(at) = self.target {
                let wait = (at - self.clock.now()).to_std().unwrap_or(StdDuration::ZERO);
                let sleep = time::sleep(wait);
                tokio::pin!(sleep);
                select! {
                    _ = &mut sleep => {}
                    _ = token.cancelled() => {
                        self.stop();
                        return;
                    }
                }
            }
        }
        if token.is_cancelled() {
            self.stop();
            return;
        }

        // The alarm is due; a permit wait can still be pre-empted, the body
        // cannot.
        let _permit = match &self.semaphore {
            Some(sem) => {
                let acquire = sem.clone().acquire_owned();
                tokio::pin!(acquire);
                select! {
                    res = &mut acquire => match res {
                        Ok(permit) => Some(permit),
                        Err(_closed) => {
                            self.stop();
                            return;
                        }
                    },
                    _ = token.cancelled() => {
                        self.stop();
                        return;
                    }
                }
            }
            None => None,
        };

        self.state.store(TimerState::Running as u8, Ordering::SeqCst);
        let outcome = run_body(self.runnable.as_ref(), self.descriptor.properties()).await;

        let finished_at = self.clock.now();
        let (new_properties, failure) = match outcome {
            Ok(props) => (props, None),
            Err(e) => (None, Some(e)),
        };
        self.descriptor
            .record_execution(self.target, finished_at, new_properties);
        self.stop();

        match &failure {
            None => self.listeners.notify_success(&self.descriptor).await,
            Some(error) => self.listeners.notify_failure(&self.descriptor, error).await,
        }

        if let Some(scheduler) = scheduler.upgrade() {
            scheduler.reprocess(self.descriptor, generation).await;
        }
    }

    fn stop(&self) {
        self.state.store(TimerState::Stopped as u8, Ordering::SeqCst);
    }
}

/// Executes the task body with full isolation: returned errors pass through,
/// panics are caught and classified as [`TaskError::Panicked`].
async fn run_body(
    runnable: &dyn Runnable,
    properties: &Properties,
) -> Result<Option<Properties>, TaskError> {
    let fut = runnable.run(properties);
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(TaskError::Panicked {
            info: panic_info(payload.as_ref()),
        }),
    }
}

fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
