//! # Scheduler registry: task identity → active timer.
//!
//! The [`Scheduler`] is the process-wide (but explicitly constructed and
//! dependency-injected) table of live timers. It guarantees at most one live
//! timer per task id and closes the recurrence loop:
//!
//! ## Architecture
//! ```text
//! load(descriptors) ──► validate ──► HandlerSet.resolve ──► next_execution(task, clock.now())
//!        │                                                        │
//!        │                           none ◄──────────────────────┴──────► Some(instant)
//!        │                            │                                        │
//!        │                     retire (drop id)                   cancel prev + spawn TaskTimer
//!        │                                                                     │
//!        ▼                                                              alarm fires
//!   list()/cancel()/execute_now()                                             │
//!                                                       body + listeners + record_execution
//!                                                                              │
//!                                          reprocess(descriptor) ◄─────────────┘
//!                                          (same write-lock path as load; loop closes)
//! ```
//!
//! ## Rules
//! - All map mutations for an id happen under one write lock: "cancel
//!   previous, install new" is atomic, so no window exists where two timers
//!   for the same id are simultaneously scheduled.
//! - A timer carries a generation number; on re-arm it drops out when the
//!   registry entry no longer matches (the task was cancelled or replaced
//!   while it was firing).
//! - Per-task failures during `load` are collected and returned; one bad
//!   descriptor never aborts the rest.
//! - `cancel`/`execute_now` on an unknown id is a caller error and fails
//!   loudly with [`SchedulerError::UnknownTask`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::core::builder::SchedulerBuilder;
use crate::core::timer::{TaskTimer, TimerState};
use crate::error::SchedulerError;
use crate::listeners::{ListenerSet, TaskListener};
use crate::recurrence::next_execution;
use crate::tasks::{HandlerSet, RunnableRef, TaskDescriptor, TaskId};

/// Handle to one armed timer.
struct Handle {
    /// Descriptor snapshot as of the last arm (used by `execute_now`).
    descriptor: TaskDescriptor,
    /// Shared lifecycle state, read by `list()`.
    state: Arc<AtomicU8>,
    /// Computed instant the alarm is armed for (`None` = immediate fire of an
    /// otherwise-retired task).
    next_fire: Option<DateTime<Utc>>,
    /// Individual cancellation token for this timer.
    cancel: CancellationToken,
    /// Join handle for the timer's future.
    join: JoinHandle<()>,
    /// Identifies this arm cycle; stale timers drop out on re-arm.
    generation: u64,
}

/// Introspection snapshot of one tracked timer.
#[derive(Clone, Debug)]
pub struct TimerSnapshot {
    /// Task identity.
    pub id: TaskId,
    /// Handler key of the armed descriptor.
    pub handler: String,
    /// Current lifecycle state.
    pub state: TimerState,
    /// Instant the alarm is armed for, when one was computed.
    pub next_fire: Option<DateTime<Utc>>,
}

/// Registry of live timers with recompute/re-arm plumbing.
///
/// Construct via [`Scheduler::builder`]; share as `Arc<Scheduler>`.
pub struct Scheduler {
    cfg: SchedulerConfig,
    clock: Arc<dyn Clock>,
    handlers: HandlerSet,
    listeners: Arc<ListenerSet>,
    timers: RwLock<HashMap<TaskId, Handle>>,
    /// Optional global cap on concurrently firing task bodies.
    semaphore: Option<Arc<Semaphore>>,
    /// Parent of every timer's token; cancelled on shutdown.
    runtime_token: CancellationToken,
    /// Strictly decreasing source for generated ids (always negative).
    id_source: AtomicI64,
    generations: AtomicU64,
}

impl Scheduler {
    /// Starts building a scheduler with the given configuration.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: SchedulerConfig,
        clock: Arc<dyn Clock>,
        handlers: HandlerSet,
        listeners: ListenerSet,
    ) -> Arc<Self> {
        let semaphore = cfg
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        Arc::new(Self {
            cfg,
            clock,
            handlers,
            listeners: Arc::new(listeners),
            timers: RwLock::new(HashMap::new()),
            semaphore,
            runtime_token: CancellationToken::new(),
            id_source: AtomicI64::new(-1),
            generations: AtomicU64::new(0),
        })
    }

    /// Registers (or replaces) the task body for `name`.
    pub fn register_handler(&self, name: impl Into<String>, runnable: RunnableRef) {
        self.handlers.register(name, runnable);
    }

    /// Produces a unique identity for tasks lacking a natural persisted id.
    ///
    /// Generated ids are always negative and strictly decreasing, so they
    /// never collide with externally supplied non-negative ids.
    pub fn generate_id(&self) -> TaskId {
        TaskId(self.id_source.fetch_sub(1, Ordering::Relaxed))
    }

    /// Registers an execution-outcome listener.
    pub async fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        self.listeners.add(listener).await;
    }

    /// Removes all listeners with the given name. Returns true if any were
    /// removed.
    pub async fn remove_listener(&self, name: &str) -> bool {
        self.listeners.remove(name).await
    }

    /// Loads (or reloads) task descriptors.
    ///
    /// For each task: any live timer for the id is cancelled and replaced, the
    /// next instant is computed, and a fresh timer is armed — or the id is
    /// dropped when the calculator retires the task. Per-task errors
    /// (malformed descriptor, unknown handler) are collected into the returned
    /// vector; loading always continues with the remainder.
    pub async fn load(self: &Arc<Self>, tasks: Vec<TaskDescriptor>) -> Vec<SchedulerError> {
        let mut errors = Vec::new();
        let mut timers = self.timers.write().await;
        for task in tasks {
            if let Err(e) = self.arm_in(&mut timers, task, false) {
                errors.push(e);
            }
        }
        errors
    }

    /// Cancels and removes the timer for `id`.
    ///
    /// Cancellation is immediate for a scheduled timer; an in-flight firing is
    /// not interrupted (fire-and-forget), but it will not be re-armed.
    pub async fn cancel(&self, id: TaskId) -> Result<(), SchedulerError> {
        let handle = self
            .timers
            .write()
            .await
            .remove(&id)
            .ok_or(SchedulerError::UnknownTask { id })?;
        handle.cancel.cancel();
        Ok(())
    }

    /// Cancels and removes every live timer.
    pub async fn cancel_all(&self) {
        let handles: Vec<Handle> = {
            let mut timers = self.timers.write().await;
            timers.drain().map(|(_, h)| h).collect()
        };
        for handle in &handles {
            handle.cancel.cancel();
        }
    }

    /// Fires `id` immediately, bypassing the computed wait.
    ///
    /// The current timer is cancelled and a fresh one is armed with the
    /// immediate flag. The computed instant (when one exists) still becomes
    /// the descriptor's new anchor after the firing, so subsequent recurrence
    /// math is unaffected by the early trigger.
    pub async fn execute_now(self: &Arc<Self>, id: TaskId) -> Result<(), SchedulerError> {
        let mut timers = self.timers.write().await;
        let handle = timers.remove(&id).ok_or(SchedulerError::UnknownTask { id })?;
        handle.cancel.cancel();
        self.arm_in(&mut timers, handle.descriptor, true)
    }

    /// Returns a snapshot of all currently tracked timers, sorted by id.
    ///
    /// The snapshot is detached; it never exposes the live internal map.
    pub async fn list(&self) -> Vec<TimerSnapshot> {
        let timers = self.timers.read().await;
        let mut snapshots: Vec<TimerSnapshot> = timers
            .iter()
            .map(|(id, h)| TimerSnapshot {
                id: *id,
                handler: h.descriptor.handler().to_string(),
                state: TimerState::from_u8(h.state.load(Ordering::SeqCst)),
                next_fire: h.next_fire,
            })
            .collect();
        snapshots.sort_unstable_by_key(|s| s.id);
        snapshots
    }

    /// True if no timers are tracked.
    pub async fn is_empty(&self) -> bool {
        self.timers.read().await.is_empty()
    }

    /// Cancels all timers and waits up to the configured grace period for
    /// in-flight firings to complete.
    ///
    /// Returns [`SchedulerError::GraceExceeded`] with the ids still running
    /// when the grace period elapses first.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.runtime_token.cancel();
        let handles: Vec<(TaskId, Handle)> = {
            let mut timers = self.timers.write().await;
            timers.drain().collect()
        };

        let states: Vec<(TaskId, Arc<AtomicU8>)> = handles
            .iter()
            .map(|(id, h)| (*id, h.state.clone()))
            .collect();
        let joins = futures::future::join_all(handles.into_iter().map(|(_, h)| h.join));

        let grace = self.cfg.grace;
        match time::timeout(grace, joins).await {
            Ok(_) => Ok(()),
            Err(_elapsed) => {
                let running = states
                    .into_iter()
                    .filter(|(_, s)| {
                        TimerState::from_u8(s.load(Ordering::SeqCst)) == TimerState::Running
                    })
                    .map(|(id, _)| id)
                    .collect();
                Err(SchedulerError::GraceExceeded { grace, running })
            }
        }
    }

    /// Closes the loop after a firing: removes this timer's entry and re-arms
    /// from the updated descriptor. Called by the timer as its last step.
    pub(crate) async fn reprocess(self: Arc<Self>, descriptor: TaskDescriptor, generation: u64) {
        if self.runtime_token.is_cancelled() {
            return;
        }
        let mut timers = self.timers.write().await;
        match timers.get(&descriptor.id()) {
            // Still our entry: take it so the fresh arm replaces it.
            Some(h) if h.generation == generation => {
                timers.remove(&descriptor.id());
            }
            // Cancelled or replaced while we were firing: never re-arm.
            _ => return,
        }
        if let Err(e) = self.arm_in(&mut timers, descriptor, false) {
            eprintln!("[chronovisor] re-arm failed: {}", e.as_message());
        }
    }

    /// Validates, resolves, computes and arms one task under the caller's
    /// write lock. `run_immediately` skips the alarm wait.
    fn arm_in(
        self: &Arc<Self>,
        timers: &mut HashMap<TaskId, Handle>,
        task: TaskDescriptor,
        run_immediately: bool,
    ) -> Result<(), SchedulerError> {
        task.validate()?;
        let id = task.id();
        let runnable =
            self.handlers
                .resolve(task.handler())
                .ok_or_else(|| SchedulerError::UnknownHandler {
                    id,
                    handler: task.handler().to_string(),
                })?;

        let target = match next_execution(&task, self.clock.now()) {
            Some(at) => Some(at),
            // An explicit execute_now still fires once; the anchor is left
            // untouched and the task retires on reprocess.
            None if run_immediately => None,
            None => {
                if let Some(prev) = timers.remove(&id) {
                    prev.cancel.cancel();
                }
                return Ok(());
            }
        };

        if let Some(prev) = timers.remove(&id) {
            prev.cancel.cancel();
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(AtomicU8::new(TimerState::Scheduled as u8));
        let token = self.runtime_token.child_token();
        let timer = TaskTimer::new(
            task.clone(),
            runnable,
            target,
            run_immediately,
            self.clock.clone(),
            self.listeners.clone(),
            self.semaphore.clone(),
            state.clone(),
        );

        let weak = Arc::downgrade(self);
        let timer_token = token.clone();
        let join = tokio::spawn(async move { timer.run(timer_token, weak, generation).await });

        timers.insert(
            id,
            Handle {
                descriptor: task,
                state,
                next_fire: target,
                cancel: token,
                join,
                generation,
            },
        );
        Ok(())
    }
}
