//! # Next-occurrence calculator.
//!
//! [`next_execution`] computes the next execution instant for a task
//! descriptor given "now". It is a pure function: no I/O, no mutable state,
//! and the descriptor is never modified.
//!
//! ## Decision flow
//! ```text
//! next_execution(task, now)
//!   ├─► schedule_time > now            → schedule_time (first occurrence still ahead)
//!   ├─► Once, already due              → now (when catch-up admits) | none (retire)
//!   ├─► Timed                          → most recent past slot (when unexecuted and
//!   │                                    catch-up admits) | next future slot
//!   ├─► Daily / Monthly                → walk single-step advances from the anchor:
//!   │                                    most_past (last value < now) when admitted,
//!   │                                    else next (first value ≥ now)
//!   └─► stop-date clamp                → none when the result lands after stop_date
//! ```
//!
//! ## Rules
//! - `now` is sampled once by the caller and reused for every comparison in
//!   one pass.
//! - The catch-up window is evaluated against the *computed* missed occurrence,
//!   never the original anchor, so a long-dormant recurring task fires at most
//!   once on catch-up instead of bursting.
//! - `None` means the task retires: no future timer is armed.

use chrono::{DateTime, Duration, Utc};

use crate::recurrence::calendar;
use crate::tasks::{CatchUp, Frequency, MonthlyMode, TaskDescriptor};

/// Computes the next execution instant for `task`, or `None` when the task
/// retires (stop date exceeded, or a missed non-repeating occurrence whose
/// catch-up window has closed).
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use chronovisor::recurrence::next_execution;
/// use chronovisor::{CatchUp, Frequency, TaskDescriptor, TaskId};
///
/// let task = TaskDescriptor::new(
///     TaskId(1),
///     "report",
///     Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
/// )
/// .with_frequency(Frequency::daily(1))
/// .with_catch_up(CatchUp::Always);
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap();
/// // Today's 09:00 slot is already due and still admitted.
/// assert_eq!(
///     next_execution(&task, now),
///     Some(Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap())
/// );
/// ```
pub fn next_execution(task: &TaskDescriptor, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let computed = compute(task, now)?;
    match task.stop_date() {
        Some(stop) if computed > stop => None,
        _ => Some(computed),
    }
}

fn compute(task: &TaskDescriptor, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if task.schedule_time() > now {
        return Some(task.schedule_time());
    }
    match task.frequency() {
        Frequency::Once => next_single_shot(task, now),
        Frequency::Timed { period } => next_timed(task, now, period),
        Frequency::Daily { every } => {
            next_calendar(task, now, |cur| calendar::add_days(cur, every))
        }
        Frequency::Monthly { every, mode } => match mode {
            MonthlyMode::DayOfMonth => {
                next_calendar(task, now, |cur| calendar::add_months_clamped(cur, every))
            }
            MonthlyMode::NthWeekday => {
                // Weekday and ordinal come from the pass anchor, not the
                // rolling value inside the walk.
                let (weekday, nth) = calendar::weekday_slot(task.schedule_time());
                next_calendar(task, now, |cur| {
                    calendar::advance_nth_weekday(cur, every, weekday, nth)
                })
            }
        },
    }
}

/// Single-shot task whose instant has already passed.
fn next_single_shot(task: &TaskDescriptor, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if matches!(task.catch_up(), CatchUp::Skip) {
        return None;
    }
    let due = task.schedule_time();
    if unexecuted(task, due) && task.catch_up().admits(due, now) {
        Some(now)
    } else {
        None
    }
}

/// Fixed-interval recurrence: the most recent past slot is computed directly.
fn next_timed(
    task: &TaskDescriptor,
    now: DateTime<Utc>,
    period: std::time::Duration,
) -> Option<DateTime<Utc>> {
    let period_ms = i64::try_from(period.as_millis()).ok()?;
    if period_ms <= 0 {
        return None;
    }
    let anchor = task.schedule_time();
    let elapsed_periods = (now - anchor).num_milliseconds() / period_ms;
    let most_past = anchor.checked_add_signed(Duration::milliseconds(elapsed_periods * period_ms))?;

    if unexecuted(task, most_past) && task.catch_up().admits(most_past, now) {
        Some(most_past)
    } else {
        most_past.checked_add_signed(Duration::milliseconds(period_ms))
    }
}

/// Calendar recurrence: walk single-step advances from the anchor until the
/// value reaches `now`, tracking the last slot that is still in the past.
fn next_calendar(
    task: &TaskDescriptor,
    now: DateTime<Utc>,
    step: impl Fn(DateTime<Utc>) -> Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let mut most_past = None;
    let mut cur = task.schedule_time();
    while cur < now {
        most_past = Some(cur);
        let next = step(cur)?;
        if next <= cur {
            // step must advance; a descriptor that slipped past validation
            // would otherwise loop forever
            return None;
        }
        cur = next;
    }
    match most_past {
        Some(slot) if unexecuted(task, slot) && task.catch_up().admits(slot, now) => Some(slot),
        _ => Some(cur),
    }
}

/// True if `occurrence` has not yet been honored by a finished execution.
fn unexecuted(task: &TaskDescriptor, occurrence: DateTime<Utc>) -> bool {
    task.last_execution().map_or(true, |last| occurrence > last)
}
