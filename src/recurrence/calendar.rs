//! # Calendar arithmetic helpers.
//!
//! Small pure functions over `chrono` used by the recurrence calculator:
//! day/month advances, month lengths, and "Nth weekday of the month"
//! resolution.
//!
//! ## Rules
//! - Month advances **clamp**: day 31 advanced into a 30-day month lands on
//!   the 30th (day 29 into non-leap February lands on the 28th). This is the
//!   documented overflow policy for day-of-month recurrence.
//! - Nth-weekday resolution steps back by whole weeks when the target month
//!   lacks an Nth occurrence (a "5th Friday" resolves to the last Friday).

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};

/// Advances `at` by a whole number of days.
pub(crate) fn add_days(at: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    at.checked_add_signed(Duration::days(i64::from(days)))
}

/// Advances `at` by a whole number of months, preserving time-of-day and
/// clamping the day to the length of the target month.
pub(crate) fn add_months_clamped(at: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    at.checked_add_months(Months::new(months))
}

/// Number of days in the given month.
pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Weekday of `at` and its ordinal occurrence within the month (1-based):
/// the 15th is always the 3rd occurrence of its weekday.
pub(crate) fn weekday_slot(at: DateTime<Utc>) -> (Weekday, u32) {
    (at.weekday(), at.day0() / 7 + 1)
}

/// Resolves "the `nth` occurrence of `weekday`" within the given month,
/// stepping back by whole weeks when the month has no such occurrence.
pub(crate) fn nth_weekday_of_month(
    year: i32,
    month: u32,
    weekday: Weekday,
    nth: u32,
) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset =
        (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let mut day = 1 + offset + (nth.max(1) - 1) * 7;
    let last = days_in_month(year, month);
    while day > last {
        day -= 7;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Advances `current` by `months` months, re-resolving the `nth` `weekday`
/// slot within the target month and preserving time-of-day.
pub(crate) fn advance_nth_weekday(
    current: DateTime<Utc>,
    months: u32,
    weekday: Weekday,
    nth: u32,
) -> Option<DateTime<Utc>> {
    let shifted = current.checked_add_months(Months::new(months))?;
    let date = nth_weekday_of_month(shifted.year(), shifted.month(), weekday, nth)?;
    Some(date.and_time(current.time()).and_utc())
}
