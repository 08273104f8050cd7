//! Date/time extraction intrinsics (§6.4, §6.5) over `date-in-millis`,
//! `time-of-day-in-millis`, and `timestamp-in-millis` values, all
//! represented as milliseconds since the Unix epoch (`timestamp-in-millis`)
//! or milliseconds since local midnight (`time-of-day-in-millis`).
//!
//! `week_of_year` defers to `chrono`'s `iso_week()`, which already
//! implements the ISO 8601 rules in §6.5 (week 1 contains the first
//! Thursday; a year's first/last few days can belong to the adjacent
//! year's week range) rather than reimplementing that arithmetic here.

use chrono::{DateTime, Datelike, Timelike, Utc};

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_year(millis: i64) -> i32 {
    from_millis(millis).year()
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_month(millis: i64) -> i32 {
    from_millis(millis).month() as i32
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_day(millis: i64) -> i32 {
    from_millis(millis).day() as i32
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_hour(millis: i64) -> i32 {
    from_millis(millis).hour() as i32
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_minute(millis: i64) -> i32 {
    from_millis(millis).minute() as i32
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_second(millis: i64) -> i32 {
    from_millis(millis).second() as i32
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_day_of_year(millis: i64) -> i32 {
    from_millis(millis).ordinal() as i32
}

/// ISO 8601 day of week: Monday = 1 .. Sunday = 7 (matches the original's
/// `ExtractDayOfWeek`, which is 1-based from Monday, not Rust's
/// `Weekday::num_days_from_monday` which is 0-based).
#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_day_of_week(millis: i64) -> i32 {
    from_millis(millis).weekday().number_from_monday() as i32
}

#[unsafe(no_mangle)]
pub extern "C" fn vz_extract_week_of_year(millis: i64) -> i32 {
    from_millis(millis).iso_week().week() as i32
}
