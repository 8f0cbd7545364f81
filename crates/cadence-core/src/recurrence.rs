use chrono::{DateTime, Datelike, Duration, Months, Utc};

use crate::error::CoreError;
use crate::models::Frequency;

/// Exact number of follow-on occurrences a series owes its anchor: the
/// whole units (days, weeks, calendar months, calendar years) elapsed
/// between `due_at` and `recurrence_end`.
///
/// An end boundary earlier than the due date means the recurrence already
/// ended: zero occurrences, by policy not an error. `Never` always yields
/// zero.
pub fn occurrence_count(
    due_at: DateTime<Utc>,
    recurrence_end: DateTime<Utc>,
    frequency: Frequency,
) -> u32 {
    if recurrence_end < due_at {
        return 0;
    }
    match frequency {
        Frequency::Never => 0,
        Frequency::Daily => (recurrence_end - due_at).num_days().max(0) as u32,
        Frequency::Weekly => (recurrence_end - due_at).num_weeks().max(0) as u32,
        Frequency::Monthly => whole_months_between(due_at, recurrence_end),
        Frequency::Yearly => whole_years_between(due_at, recurrence_end),
    }
}

/// Computes the due dates of the follow-on occurrences for an anchor, in
/// increasing order.
///
/// # Behavior
/// - Occurrence `i` lands at `due_at + i` units, stepped directly from the
///   anchor. Month and year steps are calendar-aware (`chrono::Months`), so
///   a Jan 31 anchor clamps to Feb 29/28 rather than drifting.
/// - An occurrence landing exactly on `recurrence_end` is included; one
///   strictly after it is excluded.
/// - `recurrence_end < due_at` and `Never` yield an empty vector ("recurs
///   but already past its end" is a valid state, not a failure).
/// - Stepping outside chrono's representable range surfaces as
///   [`CoreError::OutOfRange`].
pub fn occurrence_dates(
    due_at: DateTime<Utc>,
    recurrence_end: DateTime<Utc>,
    frequency: Frequency,
) -> Result<Vec<DateTime<Utc>>, CoreError> {
    let count = occurrence_count(due_at, recurrence_end, frequency);
    let mut dates = Vec::with_capacity(count as usize);
    for i in 1..=count {
        let date = match frequency {
            Frequency::Daily => due_at.checked_add_signed(Duration::days(i64::from(i))),
            Frequency::Weekly => due_at.checked_add_signed(Duration::weeks(i64::from(i))),
            Frequency::Monthly => due_at.checked_add_months(Months::new(i)),
            Frequency::Yearly => due_at.checked_add_months(Months::new(i * 12)),
            // count is always zero for non-recurring tasks
            Frequency::Never => None,
        };
        dates.push(date.ok_or_else(|| {
            CoreError::OutOfRange(format!("occurrence {} ({}) after {}", i, frequency, due_at))
        })?);
    }
    Ok(dates)
}

/// Whole calendar months elapsed from `due_at` to `end` (`end >= due_at`).
/// The raw year/month delta overshoots by one when the final month is
/// partial, i.e. the day-of-month or time-of-day has not been reached yet.
fn whole_months_between(due_at: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let mut months = (end.year() - due_at.year()) * 12 + end.month() as i32 - due_at.month() as i32;
    if months <= 0 {
        return 0;
    }
    match due_at.checked_add_months(Months::new(months as u32)) {
        Some(candidate) if candidate > end => months -= 1,
        _ => {}
    }
    months.max(0) as u32
}

/// Whole calendar years elapsed from `due_at` to `end` (`end >= due_at`).
fn whole_years_between(due_at: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let mut years = end.year() - due_at.year();
    if years <= 0 {
        return 0;
    }
    match due_at.checked_add_months(Months::new(years as u32 * 12)) {
        Some(candidate) if candidate > end => years -= 1,
        _ => {}
    }
    years.max(0) as u32
}
