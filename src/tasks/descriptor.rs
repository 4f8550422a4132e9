//! # Task descriptor: the schedulable unit.
//!
//! Defines [`TaskDescriptor`], the data the scheduler reads to compute
//! occurrences, plus the supporting enums [`Frequency`], [`MonthlyMode`] and
//! [`CatchUp`].
//!
//! ## Rules
//! - Tasks sharing an id are the same schedulable unit: re-submitting an id
//!   cancels and replaces the prior timer.
//! - `schedule_time` is only ever rewritten to an instant the recurrence
//!   calculator produced (never to "now"); the rewrite happens through
//!   [`TaskDescriptor::record_execution`], the single mutation point.
//! - The descriptor's mutable fields (`last_execution`, `schedule_time`,
//!   `properties`) are owned by the one timer currently firing for the id.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::SchedulerError;

/// Opaque key→value payload passed to and optionally replaced by the task body.
pub type Properties = HashMap<String, String>;

/// Stable task identity, unique across the process.
///
/// Externally supplied ids are non-negative; ids produced by
/// [`Scheduler::generate_id`](crate::Scheduler::generate_id) are always negative,
/// so the two namespaces never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub i64);

impl TaskId {
    /// True if this id came out of the scheduler's generator.
    #[inline]
    pub fn is_generated(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(v: i64) -> Self {
        TaskId(v)
    }
}

/// Monthly advance mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MonthlyMode {
    /// Same day-of-month every period (day-31 overflow clamps to the last day
    /// of the target month).
    #[default]
    DayOfMonth,
    /// Nth occurrence of the schedule anchor's weekday within the month
    /// (e.g. "2nd Thursday"). When the target month lacks an Nth occurrence,
    /// the occurrence steps back by whole weeks until it lands in the month.
    NthWeekday,
}

/// How often a task recurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frequency {
    /// Single-shot: one occurrence at `schedule_time`, then the task retires.
    Once,
    /// Fixed-length interval measured in wall time.
    Timed {
        /// Interval between occurrences. Must be at least one millisecond,
        /// the granularity of the interval math.
        period: Duration,
    },
    /// Calendar days.
    Daily {
        /// Interval in days. Must be ≥ 1.
        every: u32,
    },
    /// Calendar months.
    Monthly {
        /// Interval in months. Must be ≥ 1.
        every: u32,
        /// Day-of-month vs. Nth-weekday resolution.
        mode: MonthlyMode,
    },
}

impl Frequency {
    /// Every `every` days.
    pub fn daily(every: u32) -> Self {
        Frequency::Daily { every }
    }

    /// Every `every` months, same day-of-month.
    pub fn monthly(every: u32) -> Self {
        Frequency::Monthly {
            every,
            mode: MonthlyMode::DayOfMonth,
        }
    }

    /// Every `every` months, Nth-weekday resolution.
    pub fn monthly_by_weekday(every: u32) -> Self {
        Frequency::Monthly {
            every,
            mode: MonthlyMode::NthWeekday,
        }
    }

    /// Fixed interval.
    pub fn timed(period: Duration) -> Self {
        Frequency::Timed { period }
    }

    /// True for every variant except [`Frequency::Once`].
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Frequency::Once)
    }
}

/// Policy for occurrences whose instant has already passed when the
/// calculator runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CatchUp {
    /// Never run late. A missed single-shot retires; a missed recurring
    /// occurrence is skipped in favor of the next future slot.
    #[default]
    Skip,
    /// Always run, no matter how late.
    Always,
    /// Run late only if the delay since the computed occurrence is within
    /// the window.
    Within(Duration),
}

impl CatchUp {
    /// True if an occurrence at `occurrence` may still run at `now`.
    ///
    /// `occurrence` must not be in the future relative to `now`.
    pub(crate) fn admits(&self, occurrence: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            CatchUp::Skip => false,
            CatchUp::Always => true,
            CatchUp::Within(window) => (now - occurrence)
                .to_std()
                .map(|late_by| late_by <= *window)
                .unwrap_or(false),
        }
    }
}

/// Descriptor of a schedulable task.
///
/// Carries everything the recurrence calculator and the timer need: identity,
/// the handler key, the schedule anchor, recurrence/catch-up/expiry policy and
/// the opaque property payload. Persistence and handler resolution live with
/// the caller; the scheduler only consults its [`HandlerSet`](crate::HandlerSet).
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
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
/// assert!(task.frequency().is_recurring());
/// ```
#[derive(Clone, Debug)]
pub struct TaskDescriptor {
    id: TaskId,
    handler: String,
    schedule_time: DateTime<Utc>,
    frequency: Frequency,
    catch_up: CatchUp,
    last_execution: Option<DateTime<Utc>>,
    stop_date: Option<DateTime<Utc>>,
    properties: Properties,
}

impl TaskDescriptor {
    /// Creates a single-shot descriptor with [`CatchUp::Skip`] and no expiry.
    pub fn new(id: TaskId, handler: impl Into<String>, schedule_time: DateTime<Utc>) -> Self {
        Self {
            id,
            handler: handler.into(),
            schedule_time,
            frequency: Frequency::Once,
            catch_up: CatchUp::default(),
            last_execution: None,
            stop_date: None,
            properties: Properties::new(),
        }
    }

    /// Sets the recurrence rule.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Sets the late-execution policy.
    pub fn with_catch_up(mut self, catch_up: CatchUp) -> Self {
        self.catch_up = catch_up;
        self
    }

    /// Sets the hard expiry ceiling: any computed occurrence strictly after
    /// `stop_date` retires the task.
    pub fn with_stop_date(mut self, stop_date: DateTime<Utc>) -> Self {
        self.stop_date = Some(stop_date);
        self
    }

    /// Sets the property payload handed to the task body.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Restores the last-finished timestamp (for callers reloading persisted
    /// descriptors).
    pub fn with_last_execution(mut self, at: DateTime<Utc>) -> Self {
        self.last_execution = Some(at);
        self
    }

    /// Task identity.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Handler key resolved against the scheduler's handler table.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Anchor instant for the first/reference occurrence.
    pub fn schedule_time(&self) -> DateTime<Utc> {
        self.schedule_time
    }

    /// Recurrence rule.
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Late-execution policy.
    pub fn catch_up(&self) -> CatchUp {
        self.catch_up
    }

    /// When the task last finished executing, if ever.
    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        self.last_execution
    }

    /// Hard expiry ceiling, if set.
    pub fn stop_date(&self) -> Option<DateTime<Utc>> {
        self.stop_date
    }

    /// Current property payload.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Checks structural validity of the descriptor.
    ///
    /// Malformed descriptors are configuration errors: `load` reports them
    /// per-task and continues with the remainder.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        match self.frequency {
            // Interval math works in whole milliseconds; a shorter period
            // would truncate to zero and never produce an occurrence.
            Frequency::Timed { period } if period.as_millis() == 0 => {
                Err(SchedulerError::InvalidDescriptor {
                    id: self.id,
                    reason: "timed frequency requires a period of at least one millisecond"
                        .into(),
                })
            }
            Frequency::Daily { every: 0 } => Err(SchedulerError::InvalidDescriptor {
                id: self.id,
                reason: "daily frequency requires an interval of at least 1 day".into(),
            }),
            Frequency::Monthly { every: 0, .. } => Err(SchedulerError::InvalidDescriptor {
                id: self.id,
                reason: "monthly frequency requires an interval of at least 1 month".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Records the outcome of one firing. This is the descriptor's only
    /// mutation point; the timer that just fired is its sole caller.
    ///
    /// - `fired_at`: the computed instant that fired; rewrites
    ///   `schedule_time` so subsequent recurrence math starts from the most
    ///   recent real occurrence. `None` leaves the anchor untouched
    ///   (immediate fire of an otherwise-retired task).
    /// - `finished_at`: wall-clock completion time, becomes `last_execution`.
    /// - `new_properties`: replacement payload from the task body; `None` or
    ///   an empty map means "no change".
    pub(crate) fn record_execution(
        &mut self,
        fired_at: Option<DateTime<Utc>>,
        finished_at: DateTime<Utc>,
        new_properties: Option<Properties>,
    ) {
        if let Some(at) = fired_at {
            self.schedule_time = at;
        }
        self.last_execution = Some(finished_at);
        if let Some(props) = new_properties {
            if !props.is_empty() {
                self.properties = props;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_generated_ids_are_disjoint_from_external() {
        assert!(TaskId(-1).is_generated());
        assert!(!TaskId(0).is_generated());
        assert!(!TaskId(42).is_generated());
    }

    #[test]
    fn test_validate_rejects_zero_timed_period() {
        let task = TaskDescriptor::new(TaskId(1), "h", anchor())
            .with_frequency(Frequency::timed(Duration::ZERO));
        let err = task.validate().unwrap_err();
        assert_eq!(err.as_label(), "invalid_descriptor");
    }

    #[test]
    fn test_validate_rejects_submillisecond_timed_period() {
        // Below the millisecond granularity the interval truncates to zero;
        // such a descriptor must fail loudly instead of silently retiring.
        let task = TaskDescriptor::new(TaskId(1), "h", anchor())
            .with_frequency(Frequency::timed(Duration::from_micros(500)));
        let err = task.validate().unwrap_err();
        assert_eq!(err.as_label(), "invalid_descriptor");

        let floor = TaskDescriptor::new(TaskId(2), "h", anchor())
            .with_frequency(Frequency::timed(Duration::from_millis(1)));
        assert!(floor.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let daily = TaskDescriptor::new(TaskId(1), "h", anchor())
            .with_frequency(Frequency::daily(0));
        assert!(daily.validate().is_err());

        let monthly = TaskDescriptor::new(TaskId(2), "h", anchor())
            .with_frequency(Frequency::monthly(0));
        assert!(monthly.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let task = TaskDescriptor::new(TaskId(1), "h", anchor())
            .with_frequency(Frequency::timed(Duration::from_secs(60)));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_record_execution_rewrites_anchor_to_fired_instant() {
        let mut task = TaskDescriptor::new(TaskId(1), "h", anchor());
        let fired = Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap();
        let finished = Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap();

        task.record_execution(Some(fired), finished, None);
        assert_eq!(task.schedule_time(), fired);
        assert_eq!(task.last_execution(), Some(finished));
    }

    #[test]
    fn test_record_execution_without_target_keeps_anchor() {
        let mut task = TaskDescriptor::new(TaskId(1), "h", anchor());
        let finished = Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap();

        task.record_execution(None, finished, None);
        assert_eq!(task.schedule_time(), anchor());
    }

    #[test]
    fn test_empty_returned_properties_mean_no_change() {
        let mut props = Properties::new();
        props.insert("k".into(), "v".into());
        let mut task = TaskDescriptor::new(TaskId(1), "h", anchor()).with_properties(props);

        task.record_execution(None, anchor(), Some(Properties::new()));
        assert_eq!(task.properties().get("k").map(String::as_str), Some("v"));

        let mut replaced = Properties::new();
        replaced.insert("k".into(), "w".into());
        task.record_execution(None, anchor(), Some(replaced));
        assert_eq!(task.properties().get("k").map(String::as_str), Some("w"));
    }

    #[test]
    fn test_catch_up_window() {
        let occurrence = anchor();
        let now = occurrence + chrono::Duration::minutes(10);

        assert!(!CatchUp::Skip.admits(occurrence, now));
        assert!(CatchUp::Always.admits(occurrence, now));
        assert!(CatchUp::Within(Duration::from_secs(11 * 60)).admits(occurrence, now));
        assert!(!CatchUp::Within(Duration::from_secs(9 * 60)).admits(occurrence, now));
        // Zero window admits an occurrence due exactly now.
        assert!(CatchUp::Within(Duration::ZERO).admits(occurrence, occurrence));
    }
}
