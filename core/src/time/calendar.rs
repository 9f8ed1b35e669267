//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! - O(1) time complexity (no year iteration)
//! - Proleptic Gregorian calendar, UTC only, no leap seconds
//! - Years are `u16`, which covers every value a 32-bit NTP timestamp can hold

use clocksync_hal::{CalendarTime, Weekday};

const SECONDS_PER_DAY: u64 = 86_400;

/// Days from 0000-03-01 to 1970-01-01
const DAYS_TO_UNIX_EPOCH: i64 = 719_468;

/// Check if year is a leap year (Gregorian calendar)
///
/// - 2000: leap (divisible by 400)
/// - 1900: NOT leap (divisible by 100 but not 400)
/// - 2024: leap (divisible by 4, not by 100)
pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Convert Unix seconds to broken-down UTC calendar time
pub fn unix_to_calendar(unix_secs: u64) -> CalendarTime {
    let days = unix_secs / SECONDS_PER_DAY;
    let secs_today = unix_secs % SECONDS_PER_DAY;

    let (year, month, day) = civil_from_days(days as i64);

    CalendarTime {
        year,
        month,
        day,
        // 1970-01-01 was a Thursday
        weekday: Weekday::from_days_since_sunday(((days + 4) % 7) as u32),
        hour: (secs_today / 3600) as u8,
        minute: ((secs_today % 3600) / 60) as u8,
        second: (secs_today % 60) as u8,
    }
}

/// Convert broken-down UTC calendar time back to Unix seconds
///
/// The weekday field is ignored. Dates before 1970 clamp to 0.
pub fn calendar_to_unix(time: &CalendarTime) -> u64 {
    let days = days_from_civil(time.year, time.month, time.day);
    if days < 0 {
        return 0;
    }

    (days as u64) * SECONDS_PER_DAY
        + (time.hour as u64) * 3600
        + (time.minute as u64) * 60
        + (time.second as u64)
}

/// Convert days since Unix epoch to civil date (year, month, day)
fn civil_from_days(days_since_epoch: i64) -> (u16, u8, u8) {
    // Shift epoch to 0000-03-01 so the leap day is the last day of the year
    let z = days_since_epoch + DAYS_TO_UNIX_EPOCH;

    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = (yoe as i64) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // March = 0
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;

    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let y = year as i64;
    let m = month as i64;
    let d = day as i64;

    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let doy = (153 * m + 2) / 5 + d - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]

    era * 146_097 + doe - DAYS_TO_UNIX_EPOCH
}
