//! `drop_columns`: remove columns from the working table.

use featcraft_core::prelude::{Schema, Table};
use serde::{Deserialize, Serialize};

use crate::plan::OpPlan;
use crate::traits::{OpError, Operator, StepContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropColumnsArgs {
    pub columns: Vec<String>,
}

impl Operator for DropColumnsArgs {
    fn name(&self) -> &'static str {
        "drop_columns"
    }

    fn inputs(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        if self.columns.is_empty() {
            return Err(OpError::InvalidArgs("drop_columns needs at least one column".into()));
        }
        let mut schema = input.clone();
        for col in &self.columns {
            schema
                .remove(col)
                .ok_or_else(|| OpError::MissingColumn(col.clone()))?;
        }
        let mut plan = OpPlan::new(schema);
        plan.dropped = self.columns.clone();
        Ok(plan)
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        for col in &self.columns {
            table.remove_column(col)?;
        }
        Ok(table)
    }
}
