//! Aggregate functions
//!
//! Each one flattens its argument row-major, coerces every cell (blanks
//! and text count as zero) and folds the numbers into a single cell.

use tblfm_plugin::prelude::*;

fn total(numbers: &[Number]) -> Number {
    numbers.iter().fold(Number::zero(), |acc, n| acc.add(n))
}

// ============ Sum ============

pub struct Sum;

static SUM_ARGS: [ArgMeta; 1] = [ArgMeta::required("range", "Cell | Range", "Cells to add up")];
static SUM_EXAMPLES: [&str; 2] = ["@>$2=sum(@I..@-1)", "$4=sum($1..$3)"];
static SUM_RELATED: [&str; 2] = ["mean", "median"];

impl FunctionPlugin for Sum {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "sum",
            description: "Exact total of every cell in the selection",
            usage: "sum(range)",
            args: &SUM_ARGS,
            returns: "Cell",
            examples: &SUM_EXAMPLES,
            category: "aggregate",
            related: &SUM_RELATED,
        }
    }

    fn call(&self, input: &Value, _ctx: &EvalContext) -> Result<Value, FormulaError> {
        Ok(Value::from_number(&total(&input.numbers())))
    }
}

// ============ Mean ============

pub struct Mean;

static MEAN_ARGS: [ArgMeta; 1] = [ArgMeta::required("range", "Cell | Range", "Cells to average")];
static MEAN_EXAMPLES: [&str; 1] = ["@>$2=mean(@I..@-1)"];
static MEAN_RELATED: [&str; 2] = ["sum", "median"];

impl FunctionPlugin for Mean {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "mean",
            description: "Arithmetic mean of every cell in the selection",
            usage: "mean(range)",
            args: &MEAN_ARGS,
            returns: "Cell",
            examples: &MEAN_EXAMPLES,
            category: "aggregate",
            related: &MEAN_RELATED,
        }
    }

    fn call(&self, input: &Value, ctx: &EvalContext) -> Result<Value, FormulaError> {
        let numbers = input.numbers();
        let count = Number::from_i64(numbers.len() as i64);
        let mean = total(&numbers).div_rounded(&count, ctx.division_digits)?;
        Ok(Value::from_number(&mean))
    }
}

// ============ Median ============

pub struct Median;

static MEDIAN_ARGS: [ArgMeta; 1] = [ArgMeta::required("range", "Cell | Range", "Cells to take the median of")];
static MEDIAN_EXAMPLES: [&str; 2] = ["@>$2=median(@I..@-1)", "median over 1, 2 → 1.5"];
static MEDIAN_RELATED: [&str; 2] = ["mean", "sum"];

impl FunctionPlugin for Median {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "median",
            description: "Middle value of the selection (average of the two middle values if even count)",
            usage: "median(range)",
            args: &MEDIAN_ARGS,
            returns: "Cell",
            examples: &MEDIAN_EXAMPLES,
            category: "aggregate",
            related: &MEDIAN_RELATED,
        }
    }

    fn call(&self, input: &Value, _ctx: &EvalContext) -> Result<Value, FormulaError> {
        let mut sorted = input.numbers();
        sorted.sort();
        let n = sorted.len();
        if n == 0 {
            return Err(FormulaError::Internal("median of an empty selection".to_string()));
        }

        if n % 2 == 1 {
            Ok(Value::from_number(&sorted[n / 2]))
        } else {
            let mid1 = &sorted[n / 2 - 1];
            let mid2 = &sorted[n / 2];
            let median = mid1.add(mid2).checked_div(&Number::from_i64(2))?;
            Ok(Value::from_number(&median))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> EvalContext {
        EvalContext::new(Arc::new(PluginRegistry::new()))
    }

    fn column(cells: &[&str]) -> Value {
        Value::from_rows(cells.iter().map(|c| vec![c.to_string()]).collect())
    }

    #[test]
    fn test_sum_flattens_block() {
        let block = Value::from_rows(vec![
            vec!["1".into(), "2".into()],
            vec!["3.5".into(), "".into()],
        ]);
        assert_eq!(Sum.call(&block, &ctx()).unwrap(), Value::cell("6.5"));
    }

    #[test]
    fn test_sum_of_durations() {
        let durations = column(&["00:15", "02:06", "00:49", "04:00", "00:30"]);
        let total = Sum.call(&durations, &ctx()).unwrap();
        assert_eq!(total, Value::cell("27600000"));
    }

    #[test]
    fn test_mean() {
        assert_eq!(Mean.call(&column(&["1", "2", "3", "4"]), &ctx()).unwrap(), Value::cell("2.5"));
        assert_eq!(
            Mean.call(&column(&["1", "0", "0"]), &ctx()).unwrap(),
            Value::cell("0.33333333333333333333")
        );
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(Median.call(&column(&["1", "2"]), &ctx()).unwrap(), Value::cell("1.5"));
        assert_eq!(Median.call(&column(&["1", "2", "3"]), &ctx()).unwrap(), Value::cell("2"));
    }

    #[test]
    fn test_median_sorts_individual_cells() {
        // Row-level sorting would pick 10 here.
        let block = Value::from_rows(vec![
            vec!["10".into(), "1".into()],
            vec!["2".into(), "30".into()],
            vec!["3".into(), "4".into()],
        ]);
        assert_eq!(Median.call(&block, &ctx()).unwrap(), Value::cell("3.5"));
        assert_eq!(Median.call(&column(&["3", "1", "2"]), &ctx()).unwrap(), Value::cell("2"));
    }

    #[test]
    fn test_standard_registry_contents() {
        let reg = crate::standard_registry();
        for name in ["sum", "mean", "median"] {
            assert!(reg.has_function(name), "missing {}", name);
        }
    }
}
