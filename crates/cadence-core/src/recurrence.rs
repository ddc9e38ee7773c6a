//! Recurrence calculator: the next occurrence of a repeating activity.

use chrono::{DateTime, Duration, Months, Utc};

use crate::activity::RecurrencePattern;

/// Compute the next occurrence from a base date, pattern, and interval.
///
/// Month-based patterns use calendar arithmetic: the day-of-month clamps to
/// the last valid day of the target month (Jan 31 + 1 month is Feb 29 in a
/// leap year, Feb 28 otherwise). Yearly is 12 x interval months, so a
/// Feb 29 base clamps to Feb 28 in non-leap target years.
///
/// Returns `None` when the date would overflow chrono's representable
/// range; callers treat `None` as "do not reschedule".
pub fn next_occurrence(
    base: DateTime<Utc>,
    pattern: RecurrencePattern,
    interval: u32,
) -> Option<DateTime<Utc>> {
    let interval = interval.max(1);
    match pattern {
        RecurrencePattern::Daily => base.checked_add_signed(Duration::days(i64::from(interval))),
        RecurrencePattern::Weekly => {
            base.checked_add_signed(Duration::days(7 * i64::from(interval)))
        }
        RecurrencePattern::Monthly => base.checked_add_months(Months::new(interval)),
        RecurrencePattern::Yearly => base.checked_add_months(Months::new(interval.checked_mul(12)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    #[test]
    fn daily_adds_interval_days() {
        assert_eq!(
            next_occurrence(date(2024, 3, 1), RecurrencePattern::Daily, 1),
            Some(date(2024, 3, 2))
        );
        assert_eq!(
            next_occurrence(date(2024, 3, 1), RecurrencePattern::Daily, 10),
            Some(date(2024, 3, 11))
        );
    }

    #[test]
    fn weekly_adds_seven_days_per_interval() {
        assert_eq!(
            next_occurrence(date(2024, 3, 1), RecurrencePattern::Weekly, 1),
            Some(date(2024, 3, 8))
        );
        assert_eq!(
            next_occurrence(date(2024, 3, 1), RecurrencePattern::Weekly, 2),
            Some(date(2024, 3, 15))
        );
    }

    #[test]
    fn monthly_clamps_to_leap_february() {
        // 2024 is a leap year
        assert_eq!(
            next_occurrence(date(2024, 1, 31), RecurrencePattern::Monthly, 1),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn monthly_clamps_to_non_leap_february() {
        assert_eq!(
            next_occurrence(date(2023, 1, 31), RecurrencePattern::Monthly, 1),
            Some(date(2023, 2, 28))
        );
    }

    #[test]
    fn monthly_rolls_over_year_boundary() {
        assert_eq!(
            next_occurrence(date(2024, 11, 15), RecurrencePattern::Monthly, 3),
            Some(date(2025, 2, 15))
        );
    }

    #[test]
    fn monthly_preserves_time_of_day() {
        let next = next_occurrence(date(2024, 5, 10), RecurrencePattern::Monthly, 1).unwrap();
        assert_eq!(next, date(2024, 6, 10));
    }

    #[test]
    fn yearly_adds_years() {
        assert_eq!(
            next_occurrence(date(2024, 6, 15), RecurrencePattern::Yearly, 2),
            Some(date(2026, 6, 15))
        );
    }

    #[test]
    fn yearly_clamps_leap_day() {
        assert_eq!(
            next_occurrence(date(2024, 2, 29), RecurrencePattern::Yearly, 1),
            Some(date(2025, 2, 28))
        );
    }

    #[test]
    fn zero_interval_treated_as_one() {
        assert_eq!(
            next_occurrence(date(2024, 3, 1), RecurrencePattern::Daily, 0),
            Some(date(2024, 3, 2))
        );
    }
}
