//! tblfm Core - Fundamental types
//!
//! This crate provides the core types used throughout tblfm:
//! - `Number`: exact decimal numbers
//! - `Value`: rectangular snapshots of cell text and their `Arity`
//! - `coerce`: cell text to number conversion (decimals, date-times, durations)
//! - `FormulaError`: structured errors

mod number;
mod value;
mod error;
pub mod coerce;
pub mod datetime;

pub use number::{Number, NumberError, DEFAULT_DIVISION_DIGITS};
pub use value::{Value, Arity};
pub use error::{FormulaError, ErrorReport, Axis, OperationName, codes};
pub use coerce::{coerce, classify, CellKind};
pub use datetime::{Timestamp, DateTimeError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Number, Value, Arity, FormulaError, coerce};
    pub use crate::error::codes;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_parse_error_names_directive() {
            let err = FormulaError::parse("@-1=@2", "relative target");
            assert_eq!(err.to_string(), "Formula '@-1=@2' could not be parsed");
            assert_eq!(err.code(), codes::PARSE_ERROR);
            assert_eq!(err.suggestion().as_deref(), Some("relative target"));
        }

        #[test]
        fn test_operand_messages() {
            let err = FormulaError::BothOperandsAreRanges { op: OperationName::Add };
            assert_eq!(err.to_string(), "At least one operand in algebraic \"add\" must be a single cell.");
            assert_eq!(
                FormulaError::DivisorMustBeCell.to_string(),
                "Right operand in algebraic \"divide\" must be a single cell."
            );
        }

        #[test]
        fn test_from_number_error() {
            let err: FormulaError = NumberError::DivisionByZero.into();
            assert_eq!(err, FormulaError::DivisionByZero);
            assert_eq!(err.code(), codes::DIV_ZERO);
        }

        #[test]
        fn test_unknown_function_suggestion() {
            let err = FormulaError::UnknownFunction {
                name: "summ".to_string(),
                directive: "@>$1=summ(@I..@-1)".to_string(),
                similar: vec!["sum".to_string(), "mean".to_string()],
            };
            assert_eq!(err.suggestion().as_deref(), Some("Did you mean: sum, mean?"));

            let err = FormulaError::UnknownFunction {
                name: "zzz".to_string(),
                directive: "@>$1=zzz(@I)".to_string(),
                similar: Vec::new(),
            };
            assert_eq!(err.suggestion().as_deref(), Some("Use list_functions to see available functions"));
        }

        #[test]
        fn test_report_serializes() {
            let err = FormulaError::EmptyRange { range: "@4..@2".to_string() };
            let report = ErrorReport::from(&err);
            let json = serde_json::to_value(&report).unwrap();
            assert_eq!(json["code"], "EMPTY_RANGE");
            assert_eq!(json["message"], "Range @4..@2 is empty");
        }
    }

    mod pipeline_tests {
        use super::*;

        #[test]
        fn test_datetime_plus_minutes_renders_back() {
            let start = coerce("2023-07-12 05:15");
            let later = start.add(&Number::from_i64(300_000));
            let ts = Timestamp::from_unix_millis(later.to_i64().unwrap());
            assert_eq!(ts.to_string(), "2023-07-12 05:20");
        }

        #[test]
        fn test_duration_sum_renders_back() {
            let total = coerce("23:00").add(&coerce("-00:20"));
            let millis = total.to_i64().unwrap();
            assert_eq!(datetime::format_hours_minutes(millis), "22:40");
        }
    }
}
