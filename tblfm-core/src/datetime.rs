//! Minute-resolution timestamps and hour:minute durations
//!
//! Cells hold date-times as `YYYY-MM-DD HH:MM` and durations as `[-]HH:MM`.
//! Arithmetic happens on milliseconds, so this module only converts
//! between those texts and epoch/duration milliseconds.
//!
//! Design principles:
//! - No external datetime crates
//! - Gregorian proleptic calendar, UTC only
//! - Never panics - all operations return Results or handle edge cases

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Constants
// ============================================================================

pub const MILLIS_PER_SECOND: i64 = 1_000;
pub const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Days in each month (non-leap year)
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Days from 0000-03-01 to 1970-01-01
const UNIX_EPOCH_DAYS: i64 = 719_468;

// ============================================================================
// Timestamp
// ============================================================================

/// A UTC instant stored as milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    millis: i64,
}

/// Broken-down calendar fields of a [`Timestamp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeComponents {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Timestamp {
    pub fn from_unix_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Create a timestamp from calendar components
    pub fn from_ymd_hms(
        year: i64,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self, DateTimeError> {
        if !(1..=12).contains(&month) {
            return Err(DateTimeError::InvalidMonth(month));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(DateTimeError::InvalidDay(day, month, year));
        }
        if hour > 23 {
            return Err(DateTimeError::InvalidHour(hour));
        }
        if minute > 59 {
            return Err(DateTimeError::InvalidMinute(minute));
        }
        if second > 59 {
            return Err(DateTimeError::InvalidSecond(second));
        }

        let time = hour as i64 * MILLIS_PER_HOUR
            + minute as i64 * MILLIS_PER_MINUTE
            + second as i64 * MILLIS_PER_SECOND;
        days_from_civil(year, month, day)
            .checked_mul(MILLIS_PER_DAY)
            .and_then(|day_millis| day_millis.checked_add(time))
            .map(Self::from_unix_millis)
            .ok_or(DateTimeError::Overflow)
    }

    /// Parse `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM` or either with `:SS`.
    pub fn parse(s: &str) -> Result<Self, DateTimeError> {
        let s = s.trim();
        let (date, time) = s
            .split_once(['T', ' '])
            .ok_or_else(|| DateTimeError::ParseError(format!("Expected date and time: {}", s)))?;

        let mut date_parts = date.splitn(3, '-');
        let year = parse_field(date_parts.next(), "year")?;
        let month = parse_field(date_parts.next(), "month")?;
        let day = parse_field(date_parts.next(), "day")?;

        let mut time_parts = time.splitn(3, ':');
        let hour = parse_field(time_parts.next(), "hour")?;
        let minute = parse_field(time_parts.next(), "minute")?;
        let second = match time_parts.next() {
            Some(part) => parse_field(Some(part), "second")?,
            None => 0,
        };

        Self::from_ymd_hms(year as i64, month, day, hour, minute, second)
    }

    pub fn as_unix_millis(&self) -> i64 {
        self.millis
    }

    pub fn to_components(&self) -> DateTimeComponents {
        let days = self.millis.div_euclid(MILLIS_PER_DAY);
        let day_millis = self.millis.rem_euclid(MILLIS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        DateTimeComponents {
            year,
            month,
            day,
            hour: (day_millis / MILLIS_PER_HOUR) as u32,
            minute: ((day_millis % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE) as u32,
            second: ((day_millis % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND) as u32,
        }
    }
}

/// Renders as `YYYY-MM-DD HH:MM`
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.to_components();
        write!(f, "{:04}-{:02}-{:02} {:02}:{:02}", c.year, c.month, c.day, c.hour, c.minute)
    }
}

fn parse_field(part: Option<&str>, name: &str) -> Result<u32, DateTimeError> {
    part.filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| DateTimeError::ParseError(format!("Invalid {}", name)))
}

// ============================================================================
// Hour:minute durations
// ============================================================================

/// Parse `[+-]H+:MM` into signed milliseconds. Minutes must be `00`-`59`.
pub fn parse_hours_minutes(s: &str) -> Result<i64, DateTimeError> {
    let s = s.trim();
    let (negative, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (hours, minutes) = unsigned
        .split_once(':')
        .ok_or_else(|| DateTimeError::ParseError(format!("Expected H:MM: {}", s)))?;
    if minutes.len() != 2 {
        return Err(DateTimeError::ParseError(format!("Expected two minute digits: {}", s)));
    }
    let hours = parse_field(Some(hours), "hours")? as i64;
    let minutes = parse_field(Some(minutes), "minutes")?;
    if minutes > 59 {
        return Err(DateTimeError::InvalidMinute(minutes));
    }

    let millis = hours * MILLIS_PER_HOUR + minutes as i64 * MILLIS_PER_MINUTE;
    Ok(if negative { -millis } else { millis })
}

/// Render signed milliseconds as `[-]HH:MM`. Partial minutes are dropped
/// toward zero; hours are not wrapped at 24.
pub fn format_hours_minutes(millis: i64) -> String {
    let total_minutes = millis / MILLIS_PER_MINUTE;
    let sign = if total_minutes < 0 { "-" } else { "" };
    let total_minutes = total_minutes.unsigned_abs();
    format!("{}{:02}:{:02}", sign, total_minutes / 60, total_minutes % 60)
}

// ============================================================================
// DateTimeError
// ============================================================================

/// Errors that can occur with datetime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeError {
    InvalidMonth(u32),
    InvalidDay(u32, u32, i64), // day, month, year
    InvalidHour(u32),
    InvalidMinute(u32),
    InvalidSecond(u32),
    ParseError(String),
    Overflow,
}

impl fmt::Display for DateTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMonth(m) => write!(f, "Invalid month: {} (must be 1-12)", m),
            Self::InvalidDay(d, m, y) => write!(f, "Invalid day: {} for {}/{}", d, m, y),
            Self::InvalidHour(h) => write!(f, "Invalid hour: {} (must be 0-23)", h),
            Self::InvalidMinute(m) => write!(f, "Invalid minute: {} (must be 0-59)", m),
            Self::InvalidSecond(s) => write!(f, "Invalid second: {} (must be 0-59)", s),
            Self::ParseError(s) => write!(f, "Parse error: {}", s),
            Self::Overflow => write!(f, "DateTime overflow"),
        }
    }
}

impl std::error::Error for DateTimeError {}

// ============================================================================
// Calendar Utilities (Gregorian proleptic)
// ============================================================================

pub fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

pub fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        m @ 1..=12 => DAYS_IN_MONTH[(m - 1) as usize],
        _ => 0,
    }
}

/// Convert civil date to days since Unix epoch
/// Algorithm from Howard Hinnant: http://howardhinnant.github.io/date_algorithms.html
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146097 + doe - UNIX_EPOCH_DAYS
}

/// Convert days since Unix epoch to civil date
/// Algorithm from Howard Hinnant: http://howardhinnant.github.io/date_algorithms.html
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + UNIX_EPOCH_DAYS;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = if mp < 10 { mp + 3 } else { mp - 9 }; // [1, 12]
    let year = if m <= 2 { y + 1 } else { y };
    (year, m as u32, d as u32)
}
