//! Cell text to number coercion
//!
//! Every operand is read through [`coerce`]: blank cells count as zero,
//! date-times become epoch milliseconds, `H:MM` durations become
//! milliseconds, and anything that is not a plain decimal counts as zero.

use crate::datetime::{parse_hours_minutes, Timestamp};
use crate::Number;
use regex::Regex;
use std::sync::OnceLock;

// ============ Compiled regex patterns ============

fn get_datetime_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[1-9][0-9]{3}-[01][0-9]-[0-3][0-9][T ][0-2][0-9]:[0-5][0-9](:[0-5][0-9])?$")
            .expect("datetime pattern compiles")
    })
}

fn get_duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?[0-9]+:[0-5][0-9]$").expect("duration pattern compiles"))
}

/// What a piece of cell text was recognised as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Blank,
    DateTime,
    Duration,
    Decimal,
    Text,
}

/// Classify cell text without converting it
pub fn classify(text: &str) -> CellKind {
    let text = text.trim();
    if text.is_empty() {
        CellKind::Blank
    } else if get_datetime_regex().is_match(text) {
        CellKind::DateTime
    } else if get_duration_regex().is_match(text) {
        CellKind::Duration
    } else if Number::from_str(text).is_ok() {
        CellKind::Decimal
    } else {
        CellKind::Text
    }
}

/// Convert cell text into an exact number. Never fails.
pub fn coerce(text: &str) -> Number {
    let text = text.trim();
    match classify(text) {
        CellKind::Blank | CellKind::Text => Number::zero(),
        CellKind::DateTime => Timestamp::parse(text)
            .map(|ts| Number::from_i64(ts.as_unix_millis()))
            .unwrap_or_else(|_| Number::zero()),
        CellKind::Duration => parse_hours_minutes(text)
            .map(Number::from_i64)
            .unwrap_or_else(|_| Number::zero()),
        CellKind::Decimal => Number::from_str(text).unwrap_or_else(|_| Number::zero()),
    }
}
