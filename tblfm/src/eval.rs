//! Expression evaluator

use crate::address::{resolve_reference, CellPos};
use crate::ast::{AlgebraicOp, Comparator, Expr};
use crate::table::Table;
use std::cmp::Ordering;
use tblfm_core::{coerce, FormulaError, Number, Value};
use tblfm_plugin::EvalContext;

/// Evaluates expressions against one table snapshot
pub struct Evaluator<'a> {
    table: &'a Table,
    ctx: &'a EvalContext,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a Table, ctx: &'a EvalContext) -> Self {
        Self { table, ctx }
    }

    /// Evaluate `expr` with `pos` as the context cell
    pub fn eval(&self, expr: &Expr, pos: CellPos) -> Result<Value, FormulaError> {
        match expr {
            Expr::Literal(text) => Ok(Value::cell(text.clone())),

            Expr::Reference(reference) => {
                let rect = resolve_reference(reference, pos, self.table.extent())?;
                Ok(self.table.select(rect))
            }

            Expr::Algebraic { op, left, right } => {
                let left = self.eval(left, pos)?;
                let right = self.eval(right, pos)?;
                apply_algebraic(*op, &left, &right, self.ctx.division_digits)
            }

            Expr::Aggregate { name, arg } => {
                let input = self.eval(arg, pos)?;
                self.ctx.registry.call_function(name, &input, self.ctx)
            }

            Expr::Conditional {
                left,
                comparator,
                right,
                then_branch,
                else_branch,
            } => {
                let left = self.eval(left, pos)?;
                let right = self.eval(right, pos)?;
                if !left.is_cell() || !right.is_cell() {
                    return Err(FormulaError::ConditionOperandMustBeCell);
                }
                let ordering = left.to_number(0, 0).cmp(&right.to_number(0, 0));
                let branch = if holds(*comparator, ordering) { then_branch } else { else_branch };
                self.eval(branch, pos)
            }
        }
    }
}

fn holds(comparator: Comparator, ordering: Ordering) -> bool {
    match comparator {
        Comparator::Gt => ordering == Ordering::Greater,
        Comparator::Lt => ordering == Ordering::Less,
        Comparator::Ge => ordering != Ordering::Less,
        Comparator::Le => ordering != Ordering::Greater,
        Comparator::Eq => ordering == Ordering::Equal,
        Comparator::Ne => ordering != Ordering::Equal,
    }
}

/// Apply `+ - * /` to two values.
///
/// One side must be a single cell; it is broadcast over the other side and
/// keeps its position as left or right operand. Quotients are rounded to
/// `division_digits` significant digits.
pub fn apply_algebraic(
    op: AlgebraicOp,
    left: &Value,
    right: &Value,
    division_digits: usize,
) -> Result<Value, FormulaError> {
    if !left.is_cell() && !right.is_cell() {
        return Err(FormulaError::BothOperandsAreRanges { op: op.name() });
    }
    if op == AlgebraicOp::Divide && !right.is_cell() {
        return Err(FormulaError::DivisorMustBeCell);
    }

    let combine = |a: &Number, b: &Number| -> Result<String, FormulaError> {
        let result = match op {
            AlgebraicOp::Add => a.add(b),
            AlgebraicOp::Subtract => a.sub(b),
            AlgebraicOp::Multiply => a.mul(b),
            AlgebraicOp::Divide => a.div_rounded(b, division_digits)?,
        };
        Ok(result.to_canonical_string())
    };

    if left.is_cell() {
        let scalar = left.to_number(0, 0);
        right.map_cells(|cell| combine(&scalar, &coerce(cell)))
    } else {
        let scalar = right.to_number(0, 0);
        left.map_cells(|cell| combine(&coerce(cell), &scalar))
    }
}
