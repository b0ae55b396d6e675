//! Plain-text tables

use crate::address::{Extent, Rect};
use serde::{Deserialize, Serialize};
use tblfm_core::Value;

/// Rows of cell text. Row 0 is the header row; short rows read as if padded
/// with blank cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn extent(&self) -> Extent {
        Extent {
            rows: self.row_count(),
            columns: self.column_count(),
        }
    }

    /// Cell text; missing cells read as blank
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    /// Overwrite one cell, padding a short row with blanks first.
    pub fn set_cell(&mut self, row: usize, column: usize, text: impl Into<String>) {
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if column >= cells.len() {
            cells.resize(column + 1, String::new());
        }
        cells[column] = text.into();
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Snapshot of a rectangle as a [`Value`]
    pub fn select(&self, rect: Rect) -> Value {
        let rows = (rect.top..=rect.bottom)
            .map(|row| {
                (rect.left..=rect.right)
                    .map(|column| self.cell(row, column).to_string())
                    .collect()
            })
            .collect();
        Value::from_rows(rows)
    }
}
