use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// The `[start, end]` interval a metrics run is bucketed into.
///
/// `start` is 00:00:00.000 on the configured first day of the week and `end`
/// is 23:59:59.999 six days later, both UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekWindow {
    pub fn containing(at: DateTime<Utc>, first_day: Weekday) -> Self {
        let today = at.date_naive();
        let back = days_since(today.weekday(), first_day);
        Self::starting_on(today - Duration::days(back))
    }

    pub fn starting_on(first_date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&first_date.and_time(NaiveTime::MIN));
        let end = start + Duration::days(7) - Duration::milliseconds(1);
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

fn days_since(day: Weekday, first_day: Weekday) -> i64 {
    let day = day.num_days_from_monday() as i64;
    let first = first_day.num_days_from_monday() as i64;
    (day - first).rem_euclid(7)
}
