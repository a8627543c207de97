//! Consecutive study days.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone};

/// Number of consecutive calendar days with activity ending at `today`.
///
/// If `today` has no activity yet but yesterday does, counting starts from
/// yesterday so that a streak survives until the day is over.
#[must_use]
pub fn study_streak<I>(days: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let days: BTreeSet<NaiveDate> = days.into_iter().filter(|d| *d <= today).collect();

    let anchor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

/// Same as [`study_streak`], collapsing timestamps to days in `now`'s zone.
#[must_use]
pub fn study_streak_at<Tz, I, T>(timestamps: I, now: DateTime<Tz>) -> u32
where
    Tz: TimeZone,
    T: TimeZone,
    I: IntoIterator<Item = DateTime<T>>,
{
    let zone = now.timezone();
    let days = timestamps
        .into_iter()
        .map(|at| at.with_timezone(&zone).date_naive());
    study_streak(days, now.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn counts_back_from_today() {
        let today = day(2024, 3, 10);
        let days = [today, day(2024, 3, 9), day(2024, 3, 8), day(2024, 3, 6)];
        assert_eq!(study_streak(days, today), 3);
    }

    #[test]
    fn yesterday_alone_keeps_streak() {
        let today = day(2024, 3, 10);
        assert_eq!(study_streak([day(2024, 3, 9)], today), 1);
        assert_eq!(study_streak([day(2024, 3, 9), day(2024, 3, 8)], today), 2);
    }

    #[test]
    fn older_activity_breaks_streak() {
        let today = day(2024, 3, 10);
        assert_eq!(study_streak([day(2024, 3, 8)], today), 0);
        assert_eq!(study_streak(std::iter::empty::<NaiveDate>(), today), 0);
    }

    #[test]
    fn duplicates_and_future_days_are_ignored() {
        let today = day(2024, 3, 10);
        let days = [today, today, day(2024, 3, 11), day(2024, 3, 9)];
        assert_eq!(study_streak(days, today), 2);
    }

    #[test]
    fn crosses_month_boundary() {
        let today = day(2024, 3, 1);
        let days = [today, day(2024, 2, 29), day(2024, 2, 28)];
        assert_eq!(study_streak(days, today), 3);
    }

    #[test]
    fn timestamps_use_local_calendar_day() {
        let utc_minus_3 = FixedOffset::west_opt(3 * 3600).unwrap();
        // 2024-03-10 01:00 UTC is still 2024-03-09 at UTC-3.
        let late_evening = Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();
        let now = Utc
            .with_ymd_and_hms(2024, 3, 10, 15, 0, 0)
            .unwrap()
            .with_timezone(&utc_minus_3);
        assert_eq!(study_streak_at([late_evening], now), 1);
        assert_eq!(study_streak_at([late_evening], now.with_timezone(&Utc)), 1);
        assert_eq!(
            study_streak_at([late_evening, late_evening - Duration::days(1)], now),
            2
        );
    }
}
