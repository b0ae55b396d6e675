//! tblfm - Table formulas for plain-text tables
//!
//! Formula directives such as `@>$>=sum(@I..@-1);hm` are parsed, then
//! applied in order to a working copy of a [`Table`]. The caller's table is
//! only replaced once every directive has applied cleanly.

mod ast;
mod parser;
mod address;
mod eval;
mod display;
mod table;
pub mod document;
mod render;

pub use ast::{Address, AlgebraicOp, CellRef, Comparator, Expr, Formula, FormulaSet, Reference};
pub use address::{resolve, resolve_reference, target_cells, CellPos, Extent, Rect};
pub use display::DisplayDirective;
pub use eval::{apply_algebraic, Evaluator};
pub use parser::{parse_directive, parse_directives};
pub use render::Renderer;
pub use table::Table;
pub use tblfm_core::{Arity, ErrorReport, FormulaError, Value};

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tblfm_core::DEFAULT_DIVISION_DIGITS;
use tblfm_plugin::{EvalContext, PluginRegistry};

/// Main tblfm engine
pub struct Tblfm {
    registry: Arc<PluginRegistry>,
    division_digits: usize,
}

impl Tblfm {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            division_digits: DEFAULT_DIVISION_DIGITS,
        }
    }

    pub fn with_standard_library() -> Self {
        Self::new(tblfm_std::standard_registry())
    }

    /// Significant digits kept on quotients
    pub fn with_division_precision(mut self, digits: usize) -> Self {
        self.division_digits = digits.max(1);
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn parse<S: AsRef<str>>(&self, directives: &[S]) -> Result<FormulaSet, FormulaError> {
        parse_directives(directives, &self.registry)
    }

    /// Parse every directive, then apply them in order.
    ///
    /// On success `table` holds the result; on any error it is left exactly
    /// as it was.
    pub fn evaluate<S: AsRef<str>>(&self, table: &mut Table, directives: &[S]) -> Result<(), FormulaError> {
        let result = self.parse(directives).and_then(|formulas| {
            let mut working = table.clone();
            self.apply(&mut working, &formulas)?;
            Ok(working)
        });

        match result {
            Ok(working) => {
                *table = working;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(code = err.code(), "formula evaluation failed: {err}");
                Err(err)
            }
        }
    }

    /// Applies formulas to `table` in place; an error leaves earlier writes
    /// behind, so callers work on a copy.
    fn apply(&self, table: &mut Table, formulas: &FormulaSet) -> Result<(), FormulaError> {
        let ctx = EvalContext::new(self.registry.clone()).with_division_digits(self.division_digits);

        for formula in &formulas.formulas {
            let cells = target_cells(&formula.target, table.extent())?;
            tracing::debug!("applying {} to {} cells", formula.source, cells.len());

            for pos in cells {
                let value = Evaluator::new(table, &ctx).eval(&formula.expr, pos)?;
                let text = write_back_text(&value, formula.display);
                tracing::trace!("@{}${} <- {text}", pos.row + 1, pos.column + 1);
                table.set_cell(pos.row, pos.column, text);
            }
        }
        Ok(())
    }

    /// Evaluate every table of a markdown document that carries
    /// `<!-- TBLFM: ... -->` lines and render the document again.
    ///
    /// The first failing table aborts the whole document.
    pub fn eval_document(&self, markdown: &str) -> Result<String, FormulaError> {
        let mut doc = document::parse(markdown);
        for block in doc.tables_mut().filter(|block| !block.directives.is_empty()) {
            self.evaluate(&mut block.table, &block.directives)?;
        }
        Ok(Renderer::new().render(&doc))
    }

    pub fn help(&self, name: Option<&str>) -> JsonValue {
        self.registry.help(name)
    }

    pub fn list_functions(&self, category: Option<&str>) -> JsonValue {
        self.registry.list_functions(category)
    }
}

impl Default for Tblfm {
    fn default() -> Self {
        Self::with_standard_library()
    }
}

/// [`Tblfm::evaluate`] with the standard function library
pub fn evaluate<S: AsRef<str>>(table: &mut Table, directives: &[S]) -> Result<(), FormulaError> {
    Tblfm::with_standard_library().evaluate(table, directives)
}

/// Text written into a target cell. A blank single cell is written as `0`.
fn write_back_text(value: &Value, display: Option<DisplayDirective>) -> String {
    let formatted;
    let value = match display {
        Some(directive) => {
            formatted = directive.apply(value);
            &formatted
        }
        None => value,
    };

    if value.is_cell() {
        match value.get(0, 0) {
            text if text.trim().is_empty() => "0".to_string(),
            text => text.to_string(),
        }
    } else {
        value.render()
    }
}
