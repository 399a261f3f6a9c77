use std::fmt;

use chrono::NaiveDate;

/// How far a deadline lies from today, in whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Today,
    Remaining(u64),
    Overdue(u64),
}

impl Countdown {
    pub fn is_overdue(self) -> bool {
        matches!(self, Countdown::Overdue(_))
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Today => write!(f, "Today!"),
            Countdown::Remaining(days) => write!(f, "{days} days left"),
            Countdown::Overdue(days) => write!(f, "{days} days ago (Expired)"),
        }
    }
}

/// Signed day difference `deadline - today`.
///
/// Both sides are dates at midnight, so this equals the rounded-up
/// millisecond difference divided by one day.
pub fn days_between(today: NaiveDate, deadline: NaiveDate) -> i64 {
    deadline.signed_duration_since(today).num_days()
}

pub fn calculate_days_left(deadline: NaiveDate, today: NaiveDate) -> Countdown {
    let diff_days = days_between(today, deadline);
    if diff_days == 0 {
        Countdown::Today
    } else if diff_days < 0 {
        Countdown::Overdue(diff_days.unsigned_abs())
    } else {
        Countdown::Remaining(diff_days.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn same_day_is_today() {
        let today = date(2026, 10, 19);
        assert_eq!(calculate_days_left(today, today).to_string(), "Today!");
    }

    #[test]
    fn one_day_past_is_expired() {
        let today = date(2026, 10, 19);
        let countdown = calculate_days_left(date(2026, 10, 18), today);
        assert_eq!(countdown, Countdown::Overdue(1));
        assert_eq!(countdown.to_string(), "1 days ago (Expired)");
        assert!(countdown.is_overdue());
    }

    #[test]
    fn one_day_future_is_left() {
        let today = date(2026, 10, 19);
        let countdown = calculate_days_left(date(2026, 10, 20), today);
        assert_eq!(countdown.to_string(), "1 days left");
    }

    #[test]
    fn spans_month_year_and_leap_boundaries() {
        assert_eq!(
            calculate_days_left(date(2027, 1, 1), date(2026, 12, 31)),
            Countdown::Remaining(1)
        );
        assert_eq!(
            calculate_days_left(date(2028, 3, 1), date(2028, 2, 28)),
            Countdown::Remaining(2)
        );
        assert_eq!(days_between(date(2026, 10, 19), date(2026, 9, 19)), -30);
    }

    #[test]
    fn is_idempotent_for_a_fixed_pair() {
        let today = date(2026, 10, 19);
        let deadline = date(2026, 12, 25);
        let first = calculate_days_left(deadline, today);
        assert_eq!(first, calculate_days_left(deadline, today));
        assert_eq!(first, Countdown::Remaining(67));
    }
}
