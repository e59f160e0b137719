use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

/// Monday..=Sunday week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

/// `time + minutes`, or `None` if that would run past midnight.
pub fn add_minutes(time: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    let (shifted, wrapped) = time.overflowing_add_signed(Duration::minutes(minutes));
    if wrapped != 0 {
        return None;
    }
    Some(shifted)
}

pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    (end - start).num_minutes()
}

/// Number of calendar days in `[start, end]`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

pub fn dates_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        // Sunday belongs to the week that started the previous Monday
        assert_eq!(week_bounds(date(2026, 3, 8)), (date(2026, 3, 2), date(2026, 3, 8)));
        assert_eq!(week_bounds(date(2026, 3, 2)), (date(2026, 3, 2), date(2026, 3, 8)));
    }

    #[test]
    fn add_minutes_refuses_to_wrap() {
        let late = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        assert_eq!(add_minutes(late, 15), NaiveTime::from_hms_opt(23, 45, 0));
        assert_eq!(add_minutes(late, 60), None);
    }

    #[test]
    fn ranges_are_inclusive() {
        assert_eq!(days_inclusive(date(2026, 3, 1), date(2026, 3, 1)), 1);
        assert_eq!(dates_between(date(2026, 2, 27), date(2026, 3, 2)).count(), 4);
        assert_eq!(round2(12.345_6), 12.35);
    }
}
