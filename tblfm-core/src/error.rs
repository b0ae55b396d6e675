//! Structured formula errors
//!
//! Every failure aborts the whole batch of directives, so errors carry
//! enough text to point at the offending directive plus a stable code
//! for machine consumers.

use crate::NumberError;
use serde::Serialize;
use thiserror::Error;

/// Standard error codes (machine-readable)
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const UNKNOWN_FUNCTION: &str = "UNKNOWN_FUNCTION";
    pub const ADDRESS_OUT_OF_RANGE: &str = "ADDRESS_OUT_OF_RANGE";
    pub const EMPTY_RANGE: &str = "EMPTY_RANGE";
    pub const BOTH_OPERANDS_ARE_RANGES: &str = "BOTH_OPERANDS_ARE_RANGES";
    pub const DIVISOR_MUST_BE_CELL: &str = "DIVISOR_MUST_BE_CELL";
    pub const CONDITION_OPERAND_MUST_BE_CELL: &str = "CONDITION_OPERAND_MUST_BE_CELL";
    pub const DIV_ZERO: &str = "DIV_ZERO";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Axis an address is resolved on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Row,
    Column,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Column => write!(f, "column"),
        }
    }
}

/// Algebraic operation names as they appear in messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationName {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl std::fmt::Display for OperationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationName::Add => "add",
            OperationName::Subtract => "subtract",
            OperationName::Multiply => "multiply",
            OperationName::Divide => "divide",
        };
        write!(f, "{}", name)
    }
}

/// Errors raised while parsing or applying formula directives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("Formula '{directive}' could not be parsed")]
    Parse { directive: String, detail: String },

    #[error("Unknown function '{name}' in formula '{directive}'")]
    UnknownFunction {
        name: String,
        directive: String,
        /// Registered names close to `name`, best match first
        similar: Vec<String>,
    },

    #[error("{axis} address {address} is outside the table (index {index}, {axis} count {extent})")]
    AddressOutOfRange {
        axis: Axis,
        address: String,
        index: i64,
        extent: usize,
    },

    #[error("Range {range} is empty")]
    EmptyRange { range: String },

    #[error("At least one operand in algebraic \"{op}\" must be a single cell.")]
    BothOperandsAreRanges { op: OperationName },

    #[error("Right operand in algebraic \"divide\" must be a single cell.")]
    DivisorMustBeCell,

    #[error("Both sides of a comparison in \"if\" must be a single cell.")]
    ConditionOperandMustBeCell,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FormulaError {
    pub fn parse(directive: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse { directive: directive.into(), detail: detail.into() }
    }

    /// Machine-readable code, see [`codes`]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => codes::PARSE_ERROR,
            Self::UnknownFunction { .. } => codes::UNKNOWN_FUNCTION,
            Self::AddressOutOfRange { .. } => codes::ADDRESS_OUT_OF_RANGE,
            Self::EmptyRange { .. } => codes::EMPTY_RANGE,
            Self::BothOperandsAreRanges { .. } => codes::BOTH_OPERANDS_ARE_RANGES,
            Self::DivisorMustBeCell => codes::DIVISOR_MUST_BE_CELL,
            Self::ConditionOperandMustBeCell => codes::CONDITION_OPERAND_MUST_BE_CELL,
            Self::DivisionByZero => codes::DIV_ZERO,
            Self::Internal(_) => codes::INTERNAL,
        }
    }

    /// Hint for fixing the directive
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Parse { detail, .. } if !detail.is_empty() => Some(detail.clone()),
            Self::Parse { .. } => Some("Check formula syntax: target=source[;display]".to_string()),
            Self::UnknownFunction { similar, .. } if !similar.is_empty() => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }
            Self::UnknownFunction { .. } => Some("Use list_functions to see available functions".to_string()),
            Self::AddressOutOfRange { .. } => Some("Addresses are 1-based; @1 is the header row".to_string()),
            Self::EmptyRange { .. } => Some("Write range endpoints in ascending order".to_string()),
            Self::BothOperandsAreRanges { .. } => Some("Aggregate one side first, e.g. sum(...)".to_string()),
            Self::DivisorMustBeCell => Some("Divide by a single cell or an aggregate".to_string()),
            Self::ConditionOperandMustBeCell => Some("Compare single cells or aggregates".to_string()),
            Self::DivisionByZero => Some("Ensure divisor is not zero".to_string()),
            Self::Internal(_) => Some("This is a bug, please report it".to_string()),
        }
    }
}

impl From<NumberError> for FormulaError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::DivisionByZero => Self::DivisionByZero,
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Serializable view used by hosts that report errors as JSON
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&FormulaError> for ErrorReport {
    fn from(err: &FormulaError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            suggestion: err.suggestion(),
        }
    }
}
