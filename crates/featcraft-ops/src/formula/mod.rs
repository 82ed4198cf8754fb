//! `custom_formula`: sandboxed expressions over columns.
//!
//! Formulas are tokenized, parsed into an AST and interpreted; nothing is
//! ever handed to a general-purpose evaluator. Validation parses the formula
//! and resolves every referenced column before any row is touched.

pub mod eval;
pub mod lexer;
pub mod parser;

use featcraft_core::prelude::{DataType, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::plan::OpPlan;
use crate::traits::{OpError, Operator, StepContext};

pub use parser::Expr;

/// Tokenize and parse a formula.
pub fn compile(src: &str) -> Result<Expr, OpError> {
    parser::parse(&lexer::tokenize(src)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaArgs {
    pub expression: String,
    pub new_col: String,
}

impl Operator for FormulaArgs {
    fn name(&self) -> &'static str {
        "custom_formula"
    }

    fn inputs(&self) -> Vec<String> {
        compile(&self.expression)
            .map(|e| e.columns().into_iter().collect())
            .unwrap_or_default()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        if self.new_col.trim().is_empty() {
            return Err(OpError::InvalidArgs("custom_formula needs a new_col".into()));
        }
        let expr = compile(&self.expression)?;
        for col in expr.columns() {
            match input.data_type_of(&col) {
                None => return Err(OpError::MissingColumn(col)),
                Some(DataType::Str) => {
                    return Err(OpError::InvalidExpression(format!(
                        "column '{col}' is text and cannot be used in a formula"
                    )))
                }
                Some(_) => {}
            }
        }
        let dt = if expr.is_comparison() {
            DataType::Bool
        } else {
            DataType::Float
        };
        Ok(OpPlan::with_output(input, &self.new_col, dt))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let expr = compile(&self.expression)?;
        let series = eval::evaluate(&expr, &table)?;
        table.set_column(series.into_column(&self.new_col))?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autogen::PrimitiveSynthesizer;
    use featcraft_core::prelude::{Column, Scalar};

    fn table() -> Table {
        Table::new(vec![
            Column::new(
                "A",
                DataType::Int,
                vec![Scalar::Int(1), Scalar::Int(2), Scalar::Null],
            ),
            Column::new(
                "B",
                DataType::Float,
                vec![Scalar::Float(0.5), Scalar::Float(0.0), Scalar::Float(3.0)],
            ),
            Column::new(
                "unit price",
                DataType::Float,
                vec![Scalar::Float(10.0), Scalar::Float(20.0), Scalar::Float(30.0)],
            ),
            Column::new(
                "label",
                DataType::Str,
                vec![Scalar::Str("x".into()), Scalar::Str("y".into()), Scalar::Str("z".into())],
            ),
        ])
        .unwrap()
    }

    fn run(expression: &str, new_col: &str) -> Result<Table, OpError> {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        let args = FormulaArgs {
            expression: expression.into(),
            new_col: new_col.into(),
        };
        args.plan(&table().schema())?;
        args.apply(table(), &mut ctx)
    }

    #[test]
    fn weighted_sum_of_delimited_columns() {
        let out = run("`A` + `B` * 2", "C").unwrap();
        assert_eq!(
            out.column("C").unwrap().values,
            vec![Scalar::Float(2.0), Scalar::Float(2.0), Scalar::Null]
        );
    }

    #[test]
    fn comparisons_produce_bool_columns() {
        let out = run("`unit price` / A >= 10", "ok").unwrap();
        let ok = out.column("ok").unwrap();
        assert_eq!(ok.data_type, DataType::Bool);
        assert_eq!(
            ok.values,
            vec![Scalar::Bool(true), Scalar::Bool(true), Scalar::Null]
        );
    }

    #[test]
    fn division_by_zero_and_functions() {
        let out = run("A / B + sqrt(pow(A, 2))", "r").unwrap();
        assert_eq!(
            out.column("r").unwrap().values,
            vec![Scalar::Float(3.0), Scalar::Null, Scalar::Null]
        );
        let out = run("round(B / 3, 2)", "r").unwrap();
        assert_eq!(out.column("r").unwrap().values[0], Scalar::Float(0.17));
    }

    #[test]
    fn validation_rejects_before_evaluation() {
        assert!(matches!(run("os.system(1)", "x"), Err(OpError::InvalidExpression(_))));
        assert!(matches!(run("missing + 1", "x"), Err(OpError::MissingColumn(_))));
        assert!(matches!(run("label * 2", "x"), Err(OpError::InvalidExpression(_))));
    }

    proptest::proptest! {
        #[test]
        fn compile_never_panics_and_rejects_foreign_syntax(src in "[a-z0-9+*/(), <>=!.'\";\\[\\]-]{0,40}") {
            let result = compile(&src);
            if src.chars().any(|c| matches!(c, '\'' | '"' | ';' | '[' | ']')) {
                proptest::prop_assert!(result.is_err());
            }
        }
    }
}
