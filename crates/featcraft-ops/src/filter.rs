//! `filter`: keep rows satisfying every condition (AND).
//!
//! Condition values are coerced to the column's type before comparing, so
//! `{col: age, op: gte, val: "18"}` compares numerically against an int column.

use std::cmp::Ordering;

use featcraft_core::prelude::{Scalar, Schema, Table};
use featcraft_core::types::{scalar_cmp, scalar_eq};
use serde::{Deserialize, Serialize};

use crate::literal::Literal;
use crate::plan::OpPlan;
use crate::traits::{OpError, Operator, StepContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
}

impl CmpOp {
    fn is_membership(self) -> bool {
        matches!(self, CmpOp::In | CmpOp::NotIn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub col: String,
    pub op: CmpOp,
    pub val: Literal,
}

/// Row filter. Has no column of its own; every condition names one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterArgs {
    pub conditions: Vec<Condition>,
}

struct Compiled<'a> {
    values: &'a [Scalar],
    op: CmpOp,
    operands: Vec<Scalar>,
}

impl Condition {
    /// Coerced comparison operands for this condition.
    fn operands(&self, schema: &Schema) -> Result<Vec<Scalar>, OpError> {
        let dt = schema
            .data_type_of(&self.col)
            .ok_or_else(|| OpError::MissingColumn(self.col.clone()))?;
        let literals = if self.op.is_membership() {
            self.val.items()
        } else {
            if let Literal::List(_) = self.val {
                return Err(OpError::InvalidArgs(format!(
                    "condition on '{}' takes a single value for {:?}",
                    self.col, self.op
                )));
            }
            vec![self.val.clone()]
        };
        if literals.is_empty() {
            return Err(OpError::InvalidArgs(format!(
                "condition on '{}' has an empty value list",
                self.col
            )));
        }
        literals.iter().map(|l| l.coerce(dt, &self.col)).collect()
    }
}

impl Compiled<'_> {
    fn matches(&self, row: usize) -> bool {
        let v = &self.values[row];
        if v.is_null() {
            return matches!(self.op, CmpOp::Neq | CmpOp::NotIn);
        }
        let first = &self.operands[0];
        match self.op {
            CmpOp::Eq => scalar_eq(v, first),
            CmpOp::Neq => !scalar_eq(v, first),
            CmpOp::Gt => scalar_cmp(v, first) == Ordering::Greater,
            CmpOp::Lt => scalar_cmp(v, first) == Ordering::Less,
            CmpOp::Gte => scalar_cmp(v, first) != Ordering::Less,
            CmpOp::Lte => scalar_cmp(v, first) != Ordering::Greater,
            CmpOp::In => self.operands.iter().any(|o| scalar_eq(v, o)),
            CmpOp::NotIn => !self.operands.iter().any(|o| scalar_eq(v, o)),
        }
    }
}

impl Operator for FilterArgs {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn inputs(&self) -> Vec<String> {
        self.conditions.iter().map(|c| c.col.clone()).collect()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        if self.conditions.is_empty() {
            return Err(OpError::InvalidArgs("filter needs at least one condition".into()));
        }
        for cond in &self.conditions {
            cond.operands(input)?;
        }
        let mut plan = OpPlan::new(input.clone());
        plan.removes_rows = true;
        Ok(plan)
    }

    fn apply(&self, table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let schema = table.schema();
        let compiled = self
            .conditions
            .iter()
            .map(|cond| {
                Ok(Compiled {
                    values: &table.column(&cond.col)?.values,
                    op: cond.op,
                    operands: cond.operands(&schema)?,
                })
            })
            .collect::<Result<Vec<_>, OpError>>()?;

        let keep: Vec<usize> = (0..table.num_rows())
            .filter(|&row| compiled.iter().all(|c| c.matches(row)))
            .collect();
        Ok(table.take(&keep))
    }
}
