//! Values produced by evaluating a formula
//!
//! A value is a rectangular snapshot of cell text. Its shape decides how
//! operators treat it: single cells broadcast, everything else is a range.

use crate::{coerce, Number};
use serde::{Deserialize, Serialize};

/// Shape classification of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    /// 1×1
    Cell,
    /// Several rows of one column
    Row,
    /// One row over several columns
    Column,
    /// Several rows and several columns
    Block,
}

impl Arity {
    pub fn of(rows: usize, columns: usize) -> Self {
        match (rows > 1, columns > 1) {
            (false, false) => Arity::Cell,
            (true, false) => Arity::Row,
            (false, true) => Arity::Column,
            (true, true) => Arity::Block,
        }
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Arity::Cell)
    }
}

/// Immutable rectangular grid of cell text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    cells: Vec<Vec<String>>,
}

impl Value {
    /// Single cell holding `text`
    pub fn cell(text: impl Into<String>) -> Self {
        Self { cells: vec![vec![text.into()]] }
    }

    pub fn from_number(n: &Number) -> Self {
        Self::cell(n.to_canonical_string())
    }

    /// Build from rows; short rows are padded with blanks so the grid
    /// stays rectangular.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut cells = if rows.is_empty() { vec![Vec::new()] } else { rows };
        for row in &mut cells {
            row.resize(width, String::new());
        }
        Self { cells }
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn columns(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn arity(&self) -> Arity {
        Arity::of(self.rows(), self.columns())
    }

    pub fn is_cell(&self) -> bool {
        self.arity().is_cell()
    }

    /// Cell text; positions outside the grid read as blank
    pub fn get(&self, row: usize, column: usize) -> &str {
        self.cells
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    pub fn to_number(&self, row: usize, column: usize) -> Number {
        coerce::coerce(self.get(row, column))
    }

    /// Row-major iteration over every cell
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().flat_map(|row| row.iter().map(String::as_str))
    }

    /// Every cell coerced to a number, row-major
    pub fn numbers(&self) -> Vec<Number> {
        self.iter().map(coerce::coerce).collect()
    }

    /// Same shape, every cell passed through `f`
    pub fn map_cells<E>(&self, mut f: impl FnMut(&str) -> Result<String, E>) -> Result<Self, E> {
        let cells = self
            .cells
            .iter()
            .map(|row| row.iter().map(|cell| f(cell)).collect::<Result<Vec<_>, E>>())
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { cells })
    }

    /// A cell renders as its raw text; anything larger as `[a, b, ...]`
    /// over its trimmed non-blank cells.
    pub fn render(&self) -> String {
        if self.is_cell() {
            return self.get(0, 0).to_string();
        }
        let items: Vec<&str> = self
            .iter()
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        format!("[{}]", items.join(", "))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}
