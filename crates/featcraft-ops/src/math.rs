//! Element-wise numeric ops: `log`, `fillna`, `clip`, `arithmetic`, `polynomial`.
//!
//! Data-quality problems (division by zero, log of values <= -1, overflow to
//! infinity) produce missing values, never errors.

use featcraft_core::prelude::{Column, DataType, Scalar, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::literal::Literal;
use crate::plan::OpPlan;
use crate::traits::{require_numeric, OpError, Operator, StepContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn eval(self, a: f64, b: f64) -> Option<f64> {
        let v = match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div if b == 0.0 => return None,
            ArithOp::Div => a / b,
        };
        Some(v).filter(|v| v.is_finite())
    }

    /// Infix word used in generated column names (`a_plus_b`).
    pub fn word(self) -> &'static str {
        match self {
            ArithOp::Add => "plus",
            ArithOp::Sub => "minus",
            ArithOp::Mul => "times",
            ArithOp::Div => "div",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogArgs {
    pub col: String,
    #[serde(default)]
    pub new_col: Option<String>,
}

impl LogArgs {
    pub fn output_name(&self) -> String {
        self.new_col.clone().unwrap_or_else(|| format!("{}_log", self.col))
    }
}

impl Operator for LogArgs {
    fn name(&self) -> &'static str {
        "log"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_numeric(input, &self.col, self.name())?;
        Ok(OpPlan::with_output(input, &self.output_name(), DataType::Float))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let values = table.column(&self.col)?.numeric_values()?;
        let logged = values.into_iter().map(|v| v.map(f64::ln_1p)).collect();
        table.set_column(Column::from_f64s(self.output_name(), logged))?;
        Ok(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillnaArgs {
    pub col: String,
    pub value: Literal,
}

impl FillnaArgs {
    /// Column type after filling: an int column filled with a fractional
    /// number becomes float.
    fn result_type(&self, current: DataType) -> DataType {
        match (current, self.value.as_f64()) {
            (DataType::Int, Some(v)) if v.fract() != 0.0 => DataType::Float,
            _ => current,
        }
    }
}

impl Operator for FillnaArgs {
    fn name(&self) -> &'static str {
        "fillna"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        let current = input
            .data_type_of(&self.col)
            .ok_or_else(|| OpError::MissingColumn(self.col.clone()))?;
        let target = self.result_type(current);
        self.value.coerce(target, &self.col)?;
        Ok(OpPlan::with_output(input, &self.col, target))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let column = table.column(&self.col)?;
        let target = self.result_type(column.data_type);
        let fill = self.value.coerce(target, &self.col)?;
        let values = column
            .values
            .iter()
            .map(|v| match v {
                Scalar::Null => Ok(fill.clone()),
                other => other.cast(target).ok_or_else(|| {
                    OpError::Exec(format!("cannot convert {other} in '{}' to {target}", self.col))
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        table.set_column(Column::new(self.col.clone(), target, values))?;
        Ok(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipArgs {
    pub col: String,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    #[serde(default)]
    pub new_col: Option<String>,
}

impl ClipArgs {
    pub fn output_name(&self) -> String {
        self.new_col.clone().unwrap_or_else(|| format!("{}_clip", self.col))
    }

    fn check_bounds(&self) -> Result<(), OpError> {
        match (self.lower, self.upper) {
            (None, None) => Err(OpError::InvalidArgs(
                "clip needs a lower or an upper bound".into(),
            )),
            (Some(lo), Some(hi)) if lo > hi => Err(OpError::InvalidArgs(format!(
                "clip lower bound {lo} exceeds upper bound {hi}"
            ))),
            _ => Ok(()),
        }
    }
}

impl Operator for ClipArgs {
    fn name(&self) -> &'static str {
        "clip"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        self.check_bounds()?;
        require_numeric(input, &self.col, self.name())?;
        Ok(OpPlan::with_output(input, &self.output_name(), DataType::Float))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        self.check_bounds()?;
        let values = table.column(&self.col)?.numeric_values()?;
        let clipped = values
            .into_iter()
            .map(|v| {
                v.map(|x| {
                    let x = self.lower.map_or(x, |lo| x.max(lo));
                    self.upper.map_or(x, |hi| x.min(hi))
                })
            })
            .collect();
        table.set_column(Column::from_f64s(self.output_name(), clipped))?;
        Ok(table)
    }
}

/// Right-hand side of an `arithmetic` step, tagged by `operand_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operand_type", rename_all = "snake_case")]
pub enum Operand {
    Scalar { value: f64 },
    Column { right_col: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithmeticArgs {
    pub col: String,
    pub operator: ArithOp,
    #[serde(flatten)]
    pub operand: Operand,
    #[serde(default)]
    pub new_col: Option<String>,
}

impl ArithmeticArgs {
    pub fn output_name(&self) -> String {
        self.new_col
            .clone()
            .unwrap_or_else(|| format!("{}_arithmetic", self.col))
    }
}

impl Operator for ArithmeticArgs {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn inputs(&self) -> Vec<String> {
        let mut cols = vec![self.col.clone()];
        if let Operand::Column { right_col } = &self.operand {
            cols.push(right_col.clone());
        }
        cols
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_numeric(input, &self.col, self.name())?;
        if let Operand::Column { right_col } = &self.operand {
            require_numeric(input, right_col, self.name())?;
        }
        Ok(OpPlan::with_output(input, &self.output_name(), DataType::Float))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let left = table.column(&self.col)?.numeric_values()?;
        let right = match &self.operand {
            Operand::Scalar { value } => vec![Some(*value); left.len()],
            Operand::Column { right_col } => table.column(right_col)?.numeric_values()?,
        };
        let out = left
            .iter()
            .zip(&right)
            .map(|(a, b)| self.operator.eval((*a)?, (*b)?))
            .collect();
        table.set_column(Column::from_f64s(self.output_name(), out))?;
        Ok(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialArgs {
    pub cols: Vec<String>,
}

/// One degree-2 term over named columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolyTerm {
    Square(String),
    Product(String, String),
}

impl PolyTerm {
    pub fn name(&self) -> String {
        match self {
            PolyTerm::Square(a) => format!("{a}_squared"),
            PolyTerm::Product(a, b) => format!("{a}_times_{b}"),
        }
    }

    /// Missing inputs count as zero.
    pub fn compute(&self, table: &Table) -> Result<Column, OpError> {
        let zeroed = |c: &str| -> Result<Vec<f64>, OpError> {
            Ok(table
                .column(c)?
                .numeric_values()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect())
        };
        let values = match self {
            PolyTerm::Square(a) => zeroed(a)?.into_iter().map(|x| Some(x * x)).collect(),
            PolyTerm::Product(a, b) => zeroed(a)?
                .into_iter()
                .zip(zeroed(b)?)
                .map(|(x, y)| Some(x * y))
                .collect(),
        };
        Ok(Column::from_f64s(self.name(), values))
    }
}

/// Squares and pairwise products, each column's square first.
pub fn poly_terms(cols: &[String]) -> Vec<PolyTerm> {
    let mut terms = Vec::new();
    for (i, a) in cols.iter().enumerate() {
        terms.push(PolyTerm::Square(a.clone()));
        for b in &cols[i + 1..] {
            terms.push(PolyTerm::Product(a.clone(), b.clone()));
        }
    }
    terms
}

impl Operator for PolynomialArgs {
    fn name(&self) -> &'static str {
        "polynomial"
    }

    fn inputs(&self) -> Vec<String> {
        self.cols.clone()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        if self.cols.is_empty() {
            return Err(OpError::InvalidArgs("polynomial needs at least one column".into()));
        }
        let mut plan = OpPlan::new(input.clone());
        for c in &self.cols {
            require_numeric(input, c, self.name())?;
        }
        for term in poly_terms(&self.cols) {
            let step = OpPlan::with_output(&plan.output_schema, &term.name(), DataType::Float);
            plan.output_schema = step.output_schema;
            plan.created.extend(step.created);
            plan.mutated.extend(step.mutated);
        }
        Ok(plan)
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        for term in poly_terms(&self.cols) {
            let column = term.compute(&table)?;
            table.set_column(column)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autogen::PrimitiveSynthesizer;

    fn nums() -> Table {
        Table::new(vec![
            Column::new(
                "a",
                DataType::Int,
                vec![Scalar::Int(1), Scalar::Int(-2), Scalar::Null, Scalar::Int(4)],
            ),
            Column::new(
                "b",
                DataType::Float,
                vec![Scalar::Float(2.0), Scalar::Float(0.0), Scalar::Float(1.0), Scalar::Float(0.5)],
            ),
        ])
        .unwrap()
    }

    fn run(op: &dyn Operator) -> Table {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        op.apply(nums(), &mut ctx).unwrap()
    }

    #[test]
    fn division_by_zero_is_missing() {
        let out = run(&ArithmeticArgs {
            col: "a".into(),
            operator: ArithOp::Div,
            operand: Operand::Column {
                right_col: "b".into(),
            },
            new_col: Some("ratio".into()),
        });
        assert_eq!(
            out.column("ratio").unwrap().values,
            vec![Scalar::Float(0.5), Scalar::Null, Scalar::Null, Scalar::Float(8.0)]
        );
    }

    #[test]
    fn log_of_minus_one_or_less_is_missing() {
        let out = run(&LogArgs {
            col: "a".into(),
            new_col: None,
        });
        let values = &out.column("a_log").unwrap().values;
        assert_eq!(values[1], Scalar::Null);
        assert!((values[0].as_f64().unwrap() - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn fillna_promotes_int_for_fractional_values() {
        let out = run(&FillnaArgs {
            col: "a".into(),
            value: Literal::Number(0.5),
        });
        let a = out.column("a").unwrap();
        assert_eq!(a.data_type, DataType::Float);
        assert_eq!(a.values[2], Scalar::Float(0.5));
        assert_eq!(a.values[0], Scalar::Float(1.0));

        let out = run(&FillnaArgs {
            col: "a".into(),
            value: Literal::Text("7".into()),
        });
        assert_eq!(out.column("a").unwrap().values[2], Scalar::Int(7));
    }

    #[test]
    fn clip_bounds() {
        let out = run(&ClipArgs {
            col: "a".into(),
            lower: Some(0.0),
            upper: Some(3.0),
            new_col: None,
        });
        assert_eq!(
            out.column("a_clip").unwrap().values,
            vec![Scalar::Float(1.0), Scalar::Float(0.0), Scalar::Null, Scalar::Float(3.0)]
        );
        let bad = ClipArgs {
            col: "a".into(),
            lower: None,
            upper: None,
            new_col: None,
        };
        assert!(bad.plan(&nums().schema()).is_err());
    }

    #[test]
    fn polynomial_terms_fill_missing_with_zero() {
        let out = run(&PolynomialArgs {
            cols: vec!["a".into(), "b".into()],
        });
        assert_eq!(
            out.column_names(),
            vec!["a", "b", "a_squared", "a_times_b", "b_squared"]
        );
        assert_eq!(out.column("a_times_b").unwrap().values[2], Scalar::Float(0.0));
        assert_eq!(out.column("a_squared").unwrap().values[1], Scalar::Float(4.0));
    }

    #[test]
    fn arithmetic_args_parse_with_operand_tag() {
        let yaml = "col: a\noperator: mul\noperand_type: scalar\nvalue: 2\n";
        let args: ArithmeticArgs = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(args.operand, Operand::Scalar { value: 2.0 });
        let yaml = "col: a\noperator: sub\noperand_type: column\nright_col: b\n";
        let args: ArithmeticArgs = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(args.inputs(), vec!["a", "b"]);
    }
}
