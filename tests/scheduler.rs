//! Integration tests for the scheduler registry: arming, replacement,
//! cancellation, immediate execution, listener fan-out, and shutdown.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chronovisor::{
    CatchUp, FixedClock, Frequency, Properties, RunnableFn, RunnableRef, Scheduler,
    SchedulerConfig, TaskDescriptor, TaskError, TaskId, TaskListener, TimerState,
};
use std::sync::Mutex;

fn counting(counter: Arc<AtomicUsize>) -> RunnableRef {
    RunnableFn::arc("counting", move |_props: Properties| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    })
}

fn due_in_past() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(1)
}

/// Polls `pred` until it holds or `timeout` elapses.
async fn wait_until(pred: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if pred() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pred()
}

/// Listener that records outcomes for assertions.
#[derive(Default)]
struct Recording {
    successes: AtomicUsize,
    failures: AtomicUsize,
    last_anchor: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl TaskListener for Recording {
    async fn on_success(&self, task: &TaskDescriptor) {
        *self.last_anchor.lock().unwrap() = Some(task.schedule_time());
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_failure(&self, _task: &TaskDescriptor, _error: &TaskError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[tokio::test]
async fn one_shot_due_task_fires_once_and_retires() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("job", counting(counter.clone()))
        .build();

    let task = TaskDescriptor::new(TaskId(1), "job", due_in_past())
        .with_catch_up(CatchUp::Always);
    assert!(scheduler.load(vec![task]).await.is_empty());

    let counter2 = counter.clone();
    assert!(wait_until(move || counter2.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await);

    // Retired: the registry drops the id after the firing.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !scheduler.is_empty().await {
        assert!(tokio::time::Instant::now() < deadline, "timer never retired");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reloading_an_id_replaces_the_previous_timer() {
    let first_fired = Arc::new(AtomicUsize::new(0));
    let second_fired = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("first", counting(first_fired.clone()))
        .with_handler("second", counting(second_fired.clone()))
        .build();

    // First submission: due in 200ms.
    let soon = Utc::now() + chrono::Duration::milliseconds(200);
    let task = TaskDescriptor::new(TaskId(5), "first", soon);
    assert!(scheduler.load(vec![task]).await.is_empty());

    // Resubmission of the same id cancels the first alarm before it fires.
    let replacement = TaskDescriptor::new(TaskId(5), "second", due_in_past())
        .with_catch_up(CatchUp::Always);
    assert!(scheduler.load(vec![replacement]).await.is_empty());

    let second = second_fired.clone();
    assert!(wait_until(move || second.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await);

    // Give the original alarm time to (not) fire.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(first_fired.load(Ordering::SeqCst), 0);
    assert_eq!(second_fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn replacement_while_body_runs_drops_the_stale_timer() {
    // A recurring task is replaced while its body is mid-flight. The stale
    // timer finishes, notices its registry entry is gone on re-arm, and drops
    // out: the old descriptor never fires again and exactly one timer stays
    // live for the id.
    let slow_fired = Arc::new(AtomicUsize::new(0));
    let slow_by_handler = slow_fired.clone();
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler(
            "slow",
            RunnableFn::arc("slow", move |_props: Properties| {
                let fired = slow_by_handler.clone();
                async move {
                    fired.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    Ok(None)
                }
            }),
        )
        .with_handler("fresh", counting(Arc::new(AtomicUsize::new(0))))
        .build();

    let task = TaskDescriptor::new(TaskId(1), "slow", due_in_past())
        .with_frequency(Frequency::timed(Duration::from_millis(100)));
    assert!(scheduler.load(vec![task]).await.is_empty());

    // Wait until the slow body is running, then replace the id mid-flight.
    let s = slow_fired.clone();
    assert!(wait_until(move || s.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await);
    let replacement =
        TaskDescriptor::new(TaskId(1), "fresh", Utc::now() + chrono::Duration::hours(1));
    assert!(scheduler.load(vec![replacement]).await.is_empty());

    // Let the slow body finish; its re-arm must drop out instead of
    // resurrecting the 100ms recurrence.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(slow_fired.load(Ordering::SeqCst), 1);

    let snapshots = scheduler.list().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].handler, "fresh");
    assert_eq!(snapshots[0].state, TimerState::Scheduled);
}

#[tokio::test]
async fn fixed_clock_drives_deterministic_arming() {
    // The injected clock, not the wall clock, decides the computed instant:
    // pinned at 2024-01-20 10:00, a daily 09:00 task skips today's missed
    // slot and arms for tomorrow 09:00 exactly.
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap();
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_clock(Arc::new(FixedClock::new(now)))
        .with_handler("report", counting(Arc::new(AtomicUsize::new(0))))
        .build();

    let anchor = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    let task = TaskDescriptor::new(TaskId(1), "report", anchor)
        .with_frequency(Frequency::daily(1));
    assert!(scheduler.load(vec![task]).await.is_empty());

    let snapshots = scheduler.list().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].state, TimerState::Scheduled);
    assert_eq!(
        snapshots[0].next_fire,
        Some(Utc.with_ymd_and_hms(2024, 1, 21, 9, 0, 0).unwrap())
    );
    scheduler.cancel_all().await;
}

#[tokio::test]
async fn timed_recurrence_keeps_firing_until_cancelled() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("tick", counting(counter.clone()))
        .build();

    let task = TaskDescriptor::new(TaskId(1), "tick", due_in_past())
        .with_frequency(Frequency::timed(Duration::from_millis(50)));
    assert!(scheduler.load(vec![task]).await.is_empty());

    let c = counter.clone();
    assert!(wait_until(move || c.load(Ordering::SeqCst) >= 3, Duration::from_secs(5)).await);

    scheduler.cancel(TaskId(1)).await.unwrap();
    let settled = counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    // At most one in-flight firing may still land after cancel (fire-and-forget).
    assert!(counter.load(Ordering::SeqCst) <= settled + 1);
}

#[tokio::test]
async fn lookup_errors_are_loud() {
    let scheduler = Scheduler::builder(SchedulerConfig::default()).build();

    let err = scheduler.cancel(TaskId(9)).await.unwrap_err();
    assert_eq!(err.as_label(), "unknown_task");

    let err = scheduler.execute_now(TaskId(9)).await.unwrap_err();
    assert_eq!(err.as_label(), "unknown_task");
}

#[tokio::test]
async fn load_isolates_per_task_errors() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("good", counting(counter.clone()))
        .build();

    let malformed = TaskDescriptor::new(TaskId(1), "good", due_in_past())
        .with_frequency(Frequency::timed(Duration::ZERO));
    let unknown_handler = TaskDescriptor::new(TaskId(2), "missing", due_in_past());
    let healthy = TaskDescriptor::new(TaskId(3), "good", due_in_past())
        .with_catch_up(CatchUp::Always);

    let errors = scheduler.load(vec![malformed, unknown_handler, healthy]).await;
    let labels: Vec<&str> = errors.iter().map(|e| e.as_label()).collect();
    assert_eq!(labels, vec!["invalid_descriptor", "unknown_handler"]);

    // The healthy task still runs.
    let c = counter.clone();
    assert!(wait_until(move || c.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn execute_now_fires_early_but_keeps_computed_anchor() {
    let counter = Arc::new(AtomicUsize::new(0));
    let recording = Arc::new(Recording::default());
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("job", counting(counter.clone()))
        .with_listeners(vec![recording.clone()])
        .build();

    // Not due for another hour.
    let anchor = Utc::now() + chrono::Duration::hours(1);
    let task = TaskDescriptor::new(TaskId(1), "job", anchor)
        .with_frequency(Frequency::daily(1));
    assert!(scheduler.load(vec![task]).await.is_empty());

    scheduler.execute_now(TaskId(1)).await.unwrap();

    let c = counter.clone();
    assert!(wait_until(move || c.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await);

    let r = recording.clone();
    assert!(
        wait_until(move || r.successes.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await
    );
    // The descriptor's anchor is the computed occurrence, not "now".
    assert_eq!(*recording.last_anchor.lock().unwrap(), Some(anchor));

    // The loop closed: a fresh timer is armed for the same computed instant.
    let snapshots = scheduler.list().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].id, TaskId(1));
    assert_eq!(snapshots[0].next_fire, Some(anchor));
}

#[tokio::test]
async fn failure_outcome_is_reported_and_recurrence_continues() {
    let recording = Arc::new(Recording::default());
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler(
            "flaky",
            RunnableFn::arc("flaky", |_props: Properties| async move {
                Err::<Option<Properties>, _>(TaskError::fail("boom"))
            }),
        )
        .with_listeners(vec![recording.clone()])
        .build();

    let task = TaskDescriptor::new(TaskId(1), "flaky", due_in_past())
        .with_frequency(Frequency::timed(Duration::from_millis(50)));
    assert!(scheduler.load(vec![task]).await.is_empty());

    // More than one failure proves the task was re-armed after failing.
    let r = recording.clone();
    assert!(
        wait_until(move || r.failures.load(Ordering::SeqCst) >= 2, Duration::from_secs(5)).await
    );
    scheduler.cancel(TaskId(1)).await.unwrap();
}

#[tokio::test]
async fn returned_properties_replace_payload_for_next_firing() {
    let seen: Arc<Mutex<Vec<Properties>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_by_handler = seen.clone();
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler(
            "stateful",
            RunnableFn::arc("stateful", move |props: Properties| {
                let seen = seen_by_handler.clone();
                async move {
                    seen.lock().unwrap().push(props.clone());
                    let count: u32 = props
                        .get("count")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let mut next = Properties::new();
                    next.insert("count".into(), (count + 1).to_string());
                    Ok(Some(next))
                }
            }),
        )
        .build();

    let task = TaskDescriptor::new(TaskId(1), "stateful", due_in_past())
        .with_frequency(Frequency::timed(Duration::from_millis(50)));
    assert!(scheduler.load(vec![task]).await.is_empty());

    let s = seen.clone();
    assert!(wait_until(move || s.lock().unwrap().len() >= 2, Duration::from_secs(5)).await);
    scheduler.cancel(TaskId(1)).await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen[0].get("count").is_none());
    assert_eq!(seen[1].get("count").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn generated_ids_are_negative_and_unique() {
    let scheduler = Scheduler::builder(SchedulerConfig::default()).build();
    let mut ids = HashSet::new();
    for _ in 0..100 {
        let id = scheduler.generate_id();
        assert!(id.is_generated());
        assert!(ids.insert(id));
    }
}

#[tokio::test]
async fn list_exposes_scheduled_snapshot() {
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("job", counting(Arc::new(AtomicUsize::new(0))))
        .build();

    let at = Utc::now() + chrono::Duration::hours(1);
    let task = TaskDescriptor::new(TaskId(7), "job", at);
    assert!(scheduler.load(vec![task]).await.is_empty());

    let snapshots = scheduler.list().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].id, TaskId(7));
    assert_eq!(snapshots[0].handler, "job");
    assert_eq!(snapshots[0].state, TimerState::Scheduled);
    assert_eq!(snapshots[0].next_fire, Some(at));

    scheduler.cancel_all().await;
    assert!(scheduler.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrently_due_tasks_each_fire_exactly_once() {
    let fired: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let fired_by_handler = fired.clone();
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler(
            "burst",
            RunnableFn::arc("burst", move |props: Properties| {
                let fired = fired_by_handler.clone();
                async move {
                    let n: i64 = props.get("n").and_then(|v| v.parse().ok()).unwrap_or(-1);
                    fired.lock().unwrap().push(n);
                    Ok(None)
                }
            }),
        )
        .build();

    let due = due_in_past();
    let tasks: Vec<TaskDescriptor> = (0..100)
        .map(|n| {
            let mut props = Properties::new();
            props.insert("n".into(), n.to_string());
            TaskDescriptor::new(TaskId(n), "burst", due)
                .with_catch_up(CatchUp::Always)
                .with_properties(props)
        })
        .collect();
    assert!(scheduler.load(tasks).await.is_empty());

    let f = fired.clone();
    assert!(wait_until(move || f.lock().unwrap().len() >= 100, Duration::from_secs(10)).await);
    // Let any stragglers double-fire if they were going to.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 100, "no lost or duplicated firings");
    let unique: HashSet<i64> = fired.iter().copied().collect();
    assert_eq!(unique.len(), 100);
}

#[tokio::test]
async fn shutdown_reports_tasks_exceeding_grace() {
    let entered = Arc::new(AtomicUsize::new(0));
    let entered_by_handler = entered.clone();
    let scheduler = Scheduler::builder(SchedulerConfig {
        grace: Duration::from_millis(50),
        ..SchedulerConfig::default()
    })
    .with_handler(
        "slow",
        RunnableFn::arc("slow", move |_props: Properties| {
            let entered = entered_by_handler.clone();
            async move {
                entered.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(None)
            }
        }),
    )
    .build();

    let task = TaskDescriptor::new(TaskId(1), "slow", due_in_past())
        .with_catch_up(CatchUp::Always);
    assert!(scheduler.load(vec![task]).await.is_empty());

    let e = entered.clone();
    assert!(wait_until(move || e.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await);

    match scheduler.shutdown().await {
        Err(chronovisor::SchedulerError::GraceExceeded { running, .. }) => {
            assert_eq!(running, vec![TaskId(1)]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_succeeds_when_nothing_is_running() {
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_handler("job", counting(Arc::new(AtomicUsize::new(0))))
        .build();

    let task = TaskDescriptor::new(TaskId(1), "job", Utc::now() + chrono::Duration::hours(1));
    assert!(scheduler.load(vec![task]).await.is_empty());
    scheduler.shutdown().await.unwrap();
}
