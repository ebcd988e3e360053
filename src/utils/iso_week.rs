use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

/// ISO 8601 week-year and week number of an instant, taken in UTC.
///
/// Near year boundaries the week-year differs from the calendar year:
/// 2024-12-31 is week 1 of 2025.
pub fn iso_year_week(timestamp: &DateTime<Utc>) -> (i32, u32) {
    let week = timestamp.date_naive().iso_week();
    (week.year(), week.week())
}

/// Monday opening the given ISO week, or `None` if the week does not exist.
pub fn iso_week_start(iso_year: i32, iso_week: u32) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(iso_year, iso_week, Weekday::Mon)
}
