use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{HabitError, HabitResult};

pub const DAYS_IN_WEEK: usize = 7;

/// Day of the week, 0 = Sunday through 6 = Saturday.
pub type DayIndex = usize;

/// Which days of the week a habit is scheduled on, indexed by [`DayIndex`].
pub type WeekDays = [bool; DAYS_IN_WEEK];

pub const DAY_NAMES: [&str; DAYS_IN_WEEK] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn day_index(date: NaiveDate) -> DayIndex {
    date.weekday().num_days_from_sunday() as DayIndex
}

/// Day that ended when `day` began.
pub fn previous_day(day: DayIndex) -> DayIndex {
    (day + DAYS_IN_WEEK - 1) % DAYS_IN_WEEK
}

/// Sunday and Saturday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(day_index(date) as i64);
    (start, start + Duration::days(DAYS_IN_WEEK as i64 - 1))
}

pub fn ensure_day(day: DayIndex) -> HabitResult<DayIndex> {
    if day < DAYS_IN_WEEK {
        Ok(day)
    } else {
        Err(HabitError::InvariantViolation(format!(
            "day index {day} is outside the week"
        )))
    }
}

pub fn day_name(day: DayIndex) -> &'static str {
    DAY_NAMES.get(day).copied().unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sunday_is_day_zero() {
        assert_eq!(day_index(date(2025, 10, 19)), 0);
        assert_eq!(day_index(date(2025, 10, 25)), 6);
    }

    #[test]
    fn week_bounds_span_sunday_to_saturday() {
        let (start, end) = week_bounds(date(2025, 10, 22));
        assert_eq!(start, date(2025, 10, 19));
        assert_eq!(end, date(2025, 10, 25));
        assert_eq!(week_bounds(date(2025, 10, 19)).0, date(2025, 10, 19));
    }

    #[test]
    fn previous_day_wraps_at_sunday() {
        assert_eq!(previous_day(0), 6);
        assert_eq!(previous_day(3), 2);
    }

    #[test]
    fn rejects_days_outside_the_week() {
        assert!(ensure_day(6).is_ok());
        assert!(matches!(
            ensure_day(7),
            Err(HabitError::InvariantViolation(_))
        ));
    }
}
