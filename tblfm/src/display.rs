//! Display directives (`;%.2f`, `;dt`, `;hm`)

use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use tblfm_core::datetime::{format_hours_minutes, Timestamp};
use tblfm_core::{coerce, Value};

/// Widest `%.Nf` accepted by the parser
pub const MAX_FIXED_DECIMALS: usize = 100;

/// Formatting applied to computed text before it is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayDirective {
    /// Exactly N fraction digits
    Fixed(usize),
    /// Epoch milliseconds as `YYYY-MM-DD HH:MM`
    DateTime,
    /// Signed milliseconds as `[-]HH:MM`
    HoursMinutes,
}

impl DisplayDirective {
    pub fn format(&self, text: &str) -> String {
        let number = coerce(text);
        match self {
            DisplayDirective::Fixed(places) => number.to_fixed(*places),
            DisplayDirective::DateTime => match number.floor().to_i64() {
                Some(millis) => Timestamp::from_unix_millis(millis).to_string(),
                None => number.to_canonical_string(),
            },
            DisplayDirective::HoursMinutes => match number.trunc().to_i64() {
                Some(millis) => format_hours_minutes(millis),
                None => number.to_canonical_string(),
            },
        }
    }

    /// A single cell is always formatted (blank reads as zero); larger
    /// values are formatted cell by cell, leaving blanks alone.
    pub fn apply(&self, value: &Value) -> Value {
        if value.is_cell() {
            return Value::cell(self.format(value.get(0, 0)));
        }
        let formatted = value.map_cells(|cell| {
            Ok::<_, Infallible>(if cell.trim().is_empty() {
                cell.to_string()
            } else {
                self.format(cell)
            })
        });
        match formatted {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for DisplayDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayDirective::Fixed(places) => write!(f, "%.{}f", places),
            DisplayDirective::DateTime => write!(f, "dt"),
            DisplayDirective::HoursMinutes => write!(f, "hm"),
        }
    }
}
