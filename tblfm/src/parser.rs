//! Directive parser
//!
//! Directive text goes through the pest grammar in `formula.pest`; the
//! resulting pairs are folded into [`Formula`]s. Arithmetic inside a group
//! is folded with a Pratt parser so `*` and `/` bind tighter than `+` and `-`.

use crate::ast::{Address, AlgebraicOp, CellRef, Comparator, Expr, Formula, FormulaSet, Reference};
use crate::display::{DisplayDirective, MAX_FIXED_DECIMALS};
use pest::error::{Error as PestError, LineColLocation};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::OnceLock;
use tblfm_core::FormulaError;
use tblfm_plugin::PluginRegistry;

#[derive(Parser)]
#[grammar = "formula.pest"]
struct FormulaParser;

fn pratt() -> &'static PrattParser<Rule> {
    static PRATT: OnceLock<PrattParser<Rule>> = OnceLock::new();
    // Lowest precedence first.
    PRATT.get_or_init(|| {
        PrattParser::new()
            .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::subtract, Assoc::Left))
            .op(Op::infix(Rule::multiply, Assoc::Left) | Op::infix(Rule::divide, Assoc::Left))
    })
}

/// Parse one directive line, which may hold several `::` separated formulas
/// and may be wrapped in `<!-- TBLFM: ... -->`.
///
/// Every error names the directive text as given.
pub fn parse_directive(text: &str, registry: &PluginRegistry) -> Result<Vec<Formula>, FormulaError> {
    let directive = text.trim();
    let builder = Builder { directive, registry };

    let mut pairs = FormulaParser::parse(Rule::directive, directive)
        .map_err(|e| builder.syntax_error(&e))?;
    let root = builder.next(&mut pairs)?;

    root.into_inner()
        .filter(|pair| pair.as_rule() == Rule::formula)
        .map(|pair| builder.formula(pair))
        .collect()
}

/// Parse every directive line in order. The first failure wins.
pub fn parse_directives<S: AsRef<str>>(
    directives: &[S],
    registry: &PluginRegistry,
) -> Result<FormulaSet, FormulaError> {
    let mut set = FormulaSet::default();
    for directive in directives {
        set.formulas.extend(parse_directive(directive.as_ref(), registry)?);
    }
    Ok(set)
}

struct Builder<'a> {
    directive: &'a str,
    registry: &'a PluginRegistry,
}

impl<'a> Builder<'a> {
    fn error(&self, detail: impl Into<String>) -> FormulaError {
        FormulaError::parse(self.directive, detail)
    }

    fn syntax_error(&self, err: &PestError<Rule>) -> FormulaError {
        let column = match err.line_col {
            LineColLocation::Pos((_, col)) | LineColLocation::Span((_, col), _) => col,
        };
        self.error(format!("column {}: {}", column, err.variant.message()))
    }

    fn unexpected(&self, rule: Rule) -> FormulaError {
        self.error(format!("unexpected {:?}", rule))
    }

    fn next<'i>(&self, pairs: &mut Pairs<'i, Rule>) -> Result<Pair<'i, Rule>, FormulaError> {
        pairs.next().ok_or_else(|| self.error("incomplete formula"))
    }

    fn formula(&self, pair: Pair<Rule>) -> Result<Formula, FormulaError> {
        let source = pair.as_str().to_string();
        let mut inner = pair.into_inner();

        let target = self.target(self.next(&mut inner)?)?;
        let expr = self.operand(self.next(&mut inner)?)?;
        let display = inner.next().map(|pair| self.display(pair)).transpose()?;

        Ok(Formula { source, target, expr, display })
    }

    fn target(&self, pair: Pair<Rule>) -> Result<Reference, FormulaError> {
        let reference = self.reference(self.next(&mut pair.into_inner())?)?;
        if reference.is_relative() {
            return Err(self.error(format!(
                "target {} must not use relative addresses",
                reference
            )));
        }
        Ok(reference)
    }

    fn reference(&self, pair: Pair<Rule>) -> Result<Reference, FormulaError> {
        match pair.as_rule() {
            Rule::range => {
                let mut inner = pair.into_inner();
                let start = self.cell_ref(self.next(&mut inner)?)?;
                let end = self.cell_ref(self.next(&mut inner)?)?;
                Ok(Reference::Range(start, end))
            }
            Rule::reference => Ok(Reference::Cell(self.cell_ref(pair)?)),
            other => Err(self.unexpected(other)),
        }
    }

    fn cell_ref(&self, pair: Pair<Rule>) -> Result<CellRef, FormulaError> {
        let mut cell = CellRef { row: None, column: None };
        for part in pair.into_inner() {
            let rule = part.as_rule();
            let address = self.address(self.next(&mut part.into_inner())?)?;
            match rule {
                Rule::row_address => cell.row = Some(address),
                Rule::column_address => cell.column = Some(address),
                other => return Err(self.unexpected(other)),
            }
        }
        Ok(cell)
    }

    fn address(&self, pair: Pair<Rule>) -> Result<Address, FormulaError> {
        let text = pair.as_str();
        match pair.as_rule() {
            Rule::first => Ok(Address::First),
            Rule::last => Ok(Address::Last),
            Rule::anchor => Ok(Address::Anchor),
            Rule::offset => text
                .parse::<i64>()
                .map(Address::Offset)
                .map_err(|_| self.error(format!("offset {} is too large", text))),
            Rule::index => match text.parse::<usize>() {
                // `0` is the context cell's own coordinate
                Ok(0) => Ok(Address::Offset(0)),
                Ok(n) => Ok(Address::Index(n)),
                Err(_) => Err(self.error(format!("index {} is too large", text))),
            },
            other => Err(self.unexpected(other)),
        }
    }

    fn operand(&self, pair: Pair<Rule>) -> Result<Expr, FormulaError> {
        match pair.as_rule() {
            Rule::number => Ok(Expr::Literal(pair.as_str().to_string())),
            Rule::text => {
                let inner = pair.into_inner().next().map_or("", |p| p.as_str());
                Ok(Expr::Literal(inner.to_string()))
            }
            Rule::reference | Rule::range => Ok(Expr::Reference(self.reference(pair)?)),
            Rule::group => self.group(pair),
            Rule::call => self.call(pair),
            Rule::conditional => self.conditional(pair),
            other => Err(self.unexpected(other)),
        }
    }

    fn group(&self, pair: Pair<Rule>) -> Result<Expr, FormulaError> {
        pratt()
            .map_primary(|primary| self.operand(primary))
            .map_infix(|left, op, right| {
                let op = match op.as_rule() {
                    Rule::add => AlgebraicOp::Add,
                    Rule::subtract => AlgebraicOp::Subtract,
                    Rule::multiply => AlgebraicOp::Multiply,
                    Rule::divide => AlgebraicOp::Divide,
                    other => return Err(self.unexpected(other)),
                };
                Ok(Expr::Algebraic {
                    op,
                    left: Box::new(left?),
                    right: Box::new(right?),
                })
            })
            .parse(pair.into_inner())
    }

    fn call(&self, pair: Pair<Rule>) -> Result<Expr, FormulaError> {
        let mut inner = pair.into_inner();
        let name = self.next(&mut inner)?.as_str().to_string();
        // Function names in formulas are case-sensitive
        let known = self.registry.get_function(&name).is_some_and(|f| f.meta().name == name);
        if !known {
            let similar = self.registry.find_similar_functions(&name).into_iter().take(3).collect();
            return Err(FormulaError::UnknownFunction {
                name,
                directive: self.directive.to_string(),
                similar,
            });
        }
        let arg = self.operand(self.next(&mut inner)?)?;
        Ok(Expr::Aggregate { name, arg: Box::new(arg) })
    }

    fn conditional(&self, pair: Pair<Rule>) -> Result<Expr, FormulaError> {
        let mut inner = pair.into_inner();

        let mut comparison = self.next(&mut inner)?.into_inner();
        let left = self.comparison_operand(self.next(&mut comparison)?)?;
        let comparator = self.comparator(self.next(&mut comparison)?)?;
        let right = self.comparison_operand(self.next(&mut comparison)?)?;

        let then_branch = self.operand(self.next(&mut inner)?)?;
        let else_branch = self.operand(self.next(&mut inner)?)?;

        Ok(Expr::Conditional {
            left: Box::new(left),
            comparator,
            right: Box::new(right),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn comparison_operand(&self, pair: Pair<Rule>) -> Result<Expr, FormulaError> {
        if pair.as_rule() == Rule::range {
            return Err(self.error(format!(
                "comparison operand {} must be a single cell",
                pair.as_str()
            )));
        }
        self.operand(pair)
    }

    fn comparator(&self, pair: Pair<Rule>) -> Result<Comparator, FormulaError> {
        match pair.as_str() {
            ">" => Ok(Comparator::Gt),
            "<" => Ok(Comparator::Lt),
            ">=" => Ok(Comparator::Ge),
            "<=" => Ok(Comparator::Le),
            "==" => Ok(Comparator::Eq),
            "!=" => Ok(Comparator::Ne),
            other => Err(self.error(format!("unknown comparator {}", other))),
        }
    }

    fn display(&self, pair: Pair<Rule>) -> Result<DisplayDirective, FormulaError> {
        let kind = self.next(&mut pair.into_inner())?;
        match kind.as_rule() {
            Rule::fixed => {
                let decimals = self.next(&mut kind.into_inner())?.as_str();
                match decimals.parse::<usize>() {
                    Ok(places) if places <= MAX_FIXED_DECIMALS => Ok(DisplayDirective::Fixed(places)),
                    _ => Err(self.error(format!(
                        "{} decimal places is too many, at most {} are allowed",
                        decimals, MAX_FIXED_DECIMALS
                    ))),
                }
            }
            Rule::datetime => Ok(DisplayDirective::DateTime),
            Rule::hours_minutes => Ok(DisplayDirective::HoursMinutes),
            other => Err(self.unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tblfm_core::codes;

    fn parse(text: &str) -> Result<Vec<Formula>, FormulaError> {
        parse_directive(text, &tblfm_std::standard_registry())
    }

    fn single(text: &str) -> Formula {
        let mut formulas = parse(text).unwrap();
        assert_eq!(formulas.len(), 1);
        formulas.remove(0)
    }

    fn cell(row: Option<Address>, column: Option<Address>) -> CellRef {
        CellRef { row, column }
    }

    fn literal(text: &str) -> Box<Expr> {
        Box::new(Expr::Literal(text.to_string()))
    }

    #[test]
    fn test_simple_reference() {
        let f = single("@>$>=@3");
        assert_eq!(f.target, Reference::Cell(cell(Some(Address::Last), Some(Address::Last))));
        assert_eq!(f.expr, Expr::Reference(Reference::Cell(cell(Some(Address::Index(3)), None))));
        assert_eq!(f.display, None);
        assert_eq!(f.source, "@>$>=@3");
    }

    #[test]
    fn test_wrapped_directive_with_several_formulas() {
        let formulas = parse("<!-- TBLFM: @>$>=@3::@>$1=@4 :: @2$1=5 -->").unwrap();
        let sources: Vec<&str> = formulas.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(sources, vec!["@>$>=@3", "@>$1=@4", "@2$1=5"]);
        assert_eq!(formulas[2].expr, Expr::Literal("5".to_string()));
    }

    #[test]
    fn test_aggregate_with_display() {
        let f = single("@>$>=sum(@I..@-1);hm");
        assert_eq!(f.display, Some(DisplayDirective::HoursMinutes));
        match f.expr {
            Expr::Aggregate { name, arg } => {
                assert_eq!(name, "sum");
                assert_eq!(
                    *arg,
                    Expr::Reference(Reference::Range(
                        cell(Some(Address::Anchor), None),
                        cell(Some(Address::Offset(-1)), None),
                    ))
                );
            }
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_fixed_and_datetime_display() {
        assert_eq!(single("@>=(@I / @3$3);%.2f").display, Some(DisplayDirective::Fixed(2)));
        assert_eq!(single("$>=($1 + $2);dt").display, Some(DisplayDirective::DateTime));
    }

    #[test]
    fn test_zero_is_self() {
        let f = single("$3=@0$1");
        assert_eq!(
            f.expr,
            Expr::Reference(Reference::Cell(cell(Some(Address::Offset(0)), Some(Address::Index(1)))))
        );
    }

    #[test]
    fn test_group_precedence() {
        let f = single("$1=(1 + 2 * 3 - 4)");
        let expected = Expr::Algebraic {
            op: AlgebraicOp::Subtract,
            left: Box::new(Expr::Algebraic {
                op: AlgebraicOp::Add,
                left: literal("1"),
                right: Box::new(Expr::Algebraic {
                    op: AlgebraicOp::Multiply,
                    left: literal("2"),
                    right: literal("3"),
                }),
            }),
            right: literal("4"),
        };
        assert_eq!(f.expr, expected);
    }

    #[test]
    fn test_negative_literal_and_nested_conditional() {
        let f = single("@5=(if(@I>@-1, @I, @-1) + -4)");
        match f.expr {
            Expr::Algebraic { op: AlgebraicOp::Add, left, right } => {
                assert!(matches!(*left, Expr::Conditional { comparator: Comparator::Gt, .. }));
                assert_eq!(*right, Expr::Literal("-4".to_string()));
            }
            other => panic!("expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_text_literal() {
        assert_eq!(single("@2$1=\"done\"").expr, Expr::Literal("done".to_string()));
    }

    #[test]
    fn test_relative_target_is_rejected() {
        for text in ["<!-- TBLFM: @-1=@2 -->", "<!-- TBLFM: @+1=@2 -->", "<!-- TBLFM: $-1=$2 -->", "$0=$1"] {
            let err = parse(text).unwrap_err();
            assert_eq!(err.code(), codes::PARSE_ERROR);
            assert_eq!(err.to_string(), format!("Formula '{}' could not be parsed", text));
        }
    }

    #[test]
    fn test_malformed_addresses() {
        let text = "<!-- TBLFM: @>$>..@>-1$>-1=@I+2$<..@I+1$I+1 -->";
        let err = parse(text).unwrap_err();
        assert_eq!(err.to_string(), format!("Formula '{}' could not be parsed", text));
    }

    #[test]
    fn test_range_in_comparison_is_rejected() {
        for text in [
            "<!-- TBLFM: @2$3..@3$3=if($1>$1..$2, $1, $2) -->",
            "<!-- TBLFM: @2$3..@3$3=if($1..$2>$2, $1, $2) -->",
        ] {
            let err = parse(text).unwrap_err();
            assert_eq!(err.to_string(), format!("Formula '{}' could not be parsed", text));
        }
    }

    #[test]
    fn test_unknown_function() {
        let err = parse("@>$>=total(@I..@-1)").unwrap_err();
        assert_eq!(err.code(), codes::UNKNOWN_FUNCTION);
        assert!(matches!(err, FormulaError::UnknownFunction { ref name, .. } if name == "total"));
    }

    #[test]
    fn test_function_names_are_case_sensitive() {
        for text in ["@>$1=SUM(@I..@-1)", "@>$1=Mean(@I..@-1)"] {
            let err = parse(text).unwrap_err();
            assert_eq!(err.code(), codes::UNKNOWN_FUNCTION);
        }
        assert!(parse("@>$1=median(@I..@-1)").is_ok());
    }

    #[test]
    fn test_unknown_function_suggests_similar_names() {
        let err = parse("@>$1=summ(@I..@-1)").unwrap_err();
        match &err {
            FormulaError::UnknownFunction { name, similar, .. } => {
                assert_eq!(name, "summ");
                assert_eq!(similar.first().map(String::as_str), Some("sum"));
            }
            other => panic!("expected unknown function, got {:?}", other),
        }
        assert!(err.suggestion().unwrap().starts_with("Did you mean: sum"));

        let err = parse("@>$1=SUM(@I..@-1)").unwrap_err();
        assert!(err.suggestion().unwrap().contains("sum"));
    }

    #[test]
    fn test_fixed_decimals_are_bounded() {
        assert_eq!(single("@2$1=@2$1;%.100f").display, Some(DisplayDirective::Fixed(100)));
        for text in ["@3$1=@2$1;%.101f", "@3$1=@2$1;%.9000000000000000000f", "@3$1=@2$1;%.99999999999999999999999f"] {
            let err = parse(text).unwrap_err();
            assert_eq!(err.code(), codes::PARSE_ERROR);
            assert_eq!(err.to_string(), format!("Formula '{}' could not be parsed", text));
        }
    }

    #[test]
    fn test_malformed_if_is_not_a_call() {
        let err = parse("$3=if($1)").unwrap_err();
        assert_eq!(err.code(), codes::PARSE_ERROR);
    }

    #[test]
    fn test_parse_directives_in_order() {
        let set = parse_directives(&["@>$>=@3", "@>$1=(@>$2+3)"], &tblfm_std::standard_registry()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.formulas[1].source, "@>$1=(@>$2+3)");

        let err = parse_directives(&["@>$>=@3", "nonsense"], &tblfm_std::standard_registry()).unwrap_err();
        assert_eq!(err.to_string(), "Formula 'nonsense' could not be parsed");
    }
}
