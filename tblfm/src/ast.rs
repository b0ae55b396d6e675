//! Abstract Syntax Tree

use crate::display::DisplayDirective;
use serde::Serialize;
use std::fmt;
use tblfm_core::OperationName;

/// One coordinate of a cell address, as written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Address {
    /// `@3`, `$2`: 1-based position
    Index(usize),
    /// `@-1`, `$+2`, `@0`: offset from the cell being computed
    Offset(i64),
    /// `<`
    First,
    /// `>`
    Last,
    /// `I`: first row below the header, first column
    Anchor,
}

impl Address {
    pub fn is_relative(&self) -> bool {
        matches!(self, Address::Offset(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Index(n) => write!(f, "{}", n),
            Address::Offset(0) => write!(f, "0"),
            Address::Offset(k) => write!(f, "{:+}", k),
            Address::First => write!(f, "<"),
            Address::Last => write!(f, ">"),
            Address::Anchor => write!(f, "I"),
        }
    }
}

/// `@row$column`, either half optional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRef {
    pub row: Option<Address>,
    pub column: Option<Address>,
}

impl CellRef {
    pub fn is_relative(&self) -> bool {
        self.row.is_some_and(|a| a.is_relative()) || self.column.is_some_and(|a| a.is_relative())
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(row) = &self.row {
            write!(f, "@{}", row)?;
        }
        if let Some(column) = &self.column {
            write!(f, "${}", column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reference {
    Cell(CellRef),
    Range(CellRef, CellRef),
}

impl Reference {
    pub fn is_range(&self) -> bool {
        matches!(self, Reference::Range(..))
    }

    pub fn is_relative(&self) -> bool {
        match self {
            Reference::Cell(cell) => cell.is_relative(),
            Reference::Range(start, end) => start.is_relative() || end.is_relative(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell(cell) => write!(f, "{}", cell),
            Reference::Range(start, end) => write!(f, "{}..{}", start, end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlgebraicOp { Add, Subtract, Multiply, Divide }

impl AlgebraicOp {
    pub fn name(&self) -> OperationName {
        match self {
            AlgebraicOp::Add => OperationName::Add,
            AlgebraicOp::Subtract => OperationName::Subtract,
            AlgebraicOp::Multiply => OperationName::Multiply,
            AlgebraicOp::Divide => OperationName::Divide,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator { Gt, Lt, Ge, Le, Eq, Ne }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    /// Number or quoted text, kept as written
    Literal(String),
    Reference(Reference),
    Algebraic {
        op: AlgebraicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Aggregate {
        name: String,
        arg: Box<Expr>,
    },
    Conditional {
        left: Box<Expr>,
        comparator: Comparator,
        right: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

/// `target=expr[;display]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    /// Text of this formula as written
    pub source: String,
    pub target: Reference,
    pub expr: Expr,
    pub display: Option<DisplayDirective>,
}

/// All formulas attached to one table, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormulaSet {
    pub formulas: Vec<Formula>,
}

impl FormulaSet {
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}
