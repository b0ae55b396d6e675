//! Address resolution
//!
//! Addresses are resolved against a context cell (the target cell being
//! computed) and the table's extent. Nothing is clamped: an address that
//! falls outside the table is an error.

use crate::ast::{Address, CellRef, Reference};
use serde::Serialize;
use tblfm_core::{Axis, FormulaError};

/// 0-based cell position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CellPos {
    pub row: usize,
    pub column: usize,
}

impl CellPos {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    fn on(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.row,
            Axis::Column => self.column,
        }
    }
}

/// Row and column counts of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub rows: usize,
    pub columns: usize,
}

impl Extent {
    fn on(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.rows,
            Axis::Column => self.columns,
        }
    }
}

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Rect {
    pub fn single(pos: CellPos) -> Self {
        Self {
            top: pos.row,
            left: pos.column,
            bottom: pos.row,
            right: pos.column,
        }
    }

    /// Row-major
    pub fn positions(&self) -> impl Iterator<Item = CellPos> + '_ {
        (self.top..=self.bottom)
            .flat_map(move |row| (self.left..=self.right).map(move |column| CellPos::new(row, column)))
    }
}

fn sigil(axis: Axis) -> char {
    match axis {
        Axis::Row => '@',
        Axis::Column => '$',
    }
}

/// Resolve one address on one axis.
pub fn resolve(address: Address, axis: Axis, context: CellPos, extent: Extent) -> Result<usize, FormulaError> {
    let size = extent.on(axis);
    let index: i64 = match address {
        Address::Index(n) => i64::try_from(n).unwrap_or(i64::MAX) - 1,
        Address::Offset(k) => (context.on(axis) as i64).saturating_add(k),
        Address::First => 0,
        Address::Last => size as i64 - 1,
        Address::Anchor => match axis {
            Axis::Row => 1,
            Axis::Column => 0,
        },
    };

    if index < 0 || index >= size as i64 {
        return Err(FormulaError::AddressOutOfRange {
            axis,
            address: format!("{}{}", sigil(axis), address),
            index: index.saturating_add(1),
            extent: size,
        });
    }
    Ok(index as usize)
}

/// Resolve a source reference. A missing axis stays at the context cell's
/// coordinate.
pub fn resolve_reference(reference: &Reference, context: CellPos, extent: Extent) -> Result<Rect, FormulaError> {
    match reference {
        Reference::Cell(cell) => Ok(Rect::single(resolve_cell(cell, context, extent)?)),
        Reference::Range(start, end) => {
            let start = resolve_cell(start, context, extent)?;
            let end = resolve_cell(end, context, extent)?;
            if start.row > end.row || start.column > end.column {
                return Err(FormulaError::EmptyRange { range: reference.to_string() });
            }
            Ok(Rect {
                top: start.row,
                left: start.column,
                bottom: end.row,
                right: end.column,
            })
        }
    }
}

fn resolve_cell(cell: &CellRef, context: CellPos, extent: Extent) -> Result<CellPos, FormulaError> {
    let row = match cell.row {
        Some(address) => resolve(address, Axis::Row, context, extent)?,
        None => context.row,
    };
    let column = match cell.column {
        Some(address) => resolve(address, Axis::Column, context, extent)?,
        None => context.column,
    };
    Ok(CellPos { row, column })
}

/// Every cell a target writes to, row-major.
///
/// A missing row axis spans the data rows (the header is never written
/// implicitly) and a missing column axis spans every column. When such a
/// span is empty the target has no cells.
pub fn target_cells(target: &Reference, extent: Extent) -> Result<Vec<CellPos>, FormulaError> {
    let (start, end) = match target {
        Reference::Cell(cell) => (cell, cell),
        Reference::Range(start, end) => (start, end),
    };

    let rows = span(start.row, end.row, Axis::Row, extent)?;
    let columns = span(start.column, end.column, Axis::Column, extent)?;
    let (Some((top, bottom)), Some((left, right))) = (rows, columns) else {
        return Ok(Vec::new());
    };

    if top > bottom || left > right {
        return Err(FormulaError::EmptyRange { range: target.to_string() });
    }
    Ok(Rect { top, left, bottom, right }.positions().collect())
}

fn span(
    start: Option<Address>,
    end: Option<Address>,
    axis: Axis,
    extent: Extent,
) -> Result<Option<(usize, usize)>, FormulaError> {
    let size = extent.on(axis);
    let origin = CellPos::default();
    let first = match axis {
        Axis::Row => 1,
        Axis::Column => 0,
    };

    let low = match start {
        Some(address) => resolve(address, axis, origin, extent)?,
        None if first < size => first,
        None => return Ok(None),
    };
    let high = match end {
        Some(address) => resolve(address, axis, origin, extent)?,
        None if size > 0 => size - 1,
        None => return Ok(None),
    };
    Ok(Some((low, high)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: Extent = Extent { rows: 5, columns: 2 };

    fn at(row: usize, column: usize) -> CellPos {
        CellPos::new(row, column)
    }

    fn cell(row: Option<Address>, column: Option<Address>) -> CellRef {
        CellRef { row, column }
    }

    #[test]
    fn test_resolve_symbols() {
        let ctx = at(3, 1);
        assert_eq!(resolve(Address::Index(1), Axis::Row, ctx, EXTENT).unwrap(), 0);
        assert_eq!(resolve(Address::First, Axis::Row, ctx, EXTENT).unwrap(), 0);
        assert_eq!(resolve(Address::Last, Axis::Row, ctx, EXTENT).unwrap(), 4);
        assert_eq!(resolve(Address::Anchor, Axis::Row, ctx, EXTENT).unwrap(), 1);
        assert_eq!(resolve(Address::Anchor, Axis::Column, ctx, EXTENT).unwrap(), 0);
        assert_eq!(resolve(Address::Offset(0), Axis::Row, ctx, EXTENT).unwrap(), 3);
        assert_eq!(resolve(Address::Offset(-2), Axis::Row, ctx, EXTENT).unwrap(), 1);
        assert_eq!(resolve(Address::Offset(-1), Axis::Column, ctx, EXTENT).unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        let err = resolve(Address::Offset(2), Axis::Row, at(3, 0), EXTENT).unwrap_err();
        assert_eq!(
            err,
            FormulaError::AddressOutOfRange {
                axis: Axis::Row,
                address: "@+2".to_string(),
                index: 6,
                extent: 5,
            }
        );
        assert!(resolve(Address::Index(3), Axis::Column, at(0, 0), EXTENT).is_err());
        assert!(resolve(Address::Offset(-1), Axis::Row, at(0, 0), EXTENT).is_err());
    }

    #[test]
    fn test_missing_axis_follows_context() {
        let reference = Reference::Range(cell(Some(Address::Index(3)), None), cell(Some(Address::Index(4)), None));
        let rect = resolve_reference(&reference, at(4, 1), EXTENT).unwrap();
        assert_eq!(rect, Rect { top: 2, left: 1, bottom: 3, right: 1 });
    }

    #[test]
    fn test_self_anchor_beside_sliding_endpoint() {
        let reference = Reference::Range(cell(Some(Address::Anchor), None), cell(Some(Address::Offset(-1)), None));
        let rect = resolve_reference(&reference, at(4, 0), EXTENT).unwrap();
        assert_eq!(rect, Rect { top: 1, left: 0, bottom: 3, right: 0 });
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let reference = Reference::Range(cell(Some(Address::Index(4)), None), cell(Some(Address::Index(2)), None));
        let err = resolve_reference(&reference, at(0, 0), EXTENT).unwrap_err();
        assert_eq!(err, FormulaError::EmptyRange { range: "@4..@2".to_string() });
    }

    #[test]
    fn test_target_cells() {
        let column = Reference::Cell(cell(None, Some(Address::Index(2))));
        assert_eq!(
            target_cells(&column, EXTENT).unwrap(),
            vec![at(1, 1), at(2, 1), at(3, 1), at(4, 1)]
        );

        let row = Reference::Cell(cell(Some(Address::Last), None));
        assert_eq!(target_cells(&row, EXTENT).unwrap(), vec![at(4, 0), at(4, 1)]);

        let range = Reference::Range(
            cell(Some(Address::Index(3)), Some(Address::Index(1))),
            cell(Some(Address::Last), Some(Address::Index(2))),
        );
        assert_eq!(
            target_cells(&range, EXTENT).unwrap(),
            vec![at(2, 0), at(2, 1), at(3, 0), at(3, 1), at(4, 0), at(4, 1)]
        );
    }

    #[test]
    fn test_column_target_without_data_rows() {
        let header_only = Extent { rows: 1, columns: 2 };
        let column = Reference::Cell(cell(None, Some(Address::Index(1))));
        assert!(target_cells(&column, header_only).unwrap().is_empty());
    }
}
