//! Whole-column scalers. Parameters are learned on fit and reused on replay.

use featcraft_core::prelude::{Column, DataType, Schema, Table};
use featcraft_core::stats;
use serde::{Deserialize, Serialize};

use crate::fitted::Fitted;
use crate::plan::OpPlan;
use crate::traits::{require_numeric, OpError, Operator, StepContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaleArgs {
    pub col: String,
    #[serde(default)]
    pub new_col: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaleArgs {
    pub col: String,
    #[serde(default)]
    pub new_col: Option<String>,
}

impl Operator for StandardScaleArgs {
    fn name(&self) -> &'static str {
        "scale_standard"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_numeric(input, &self.col, self.name())?;
        Ok(OpPlan::with_output(input, &self.output_name(), DataType::Float))
    }

    fn apply(&self, mut table: Table, ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let values = table.column(&self.col)?.numeric_values()?;
        let (mean, std) = match ctx.replayed() {
            Some(Fitted::Standard { mean, std }) => (*mean, *std),
            Some(other) => return Err(other.mismatch("standard")),
            None => {
                let present = stats::present(&values);
                (stats::mean(&present), stats::std_dev(&present, 0))
            }
        };
        ctx.record(Fitted::Standard { mean, std });

        // A constant column has no spread; every value lands on 0.
        let scale = std.filter(|s| *s > 0.0).unwrap_or(1.0);
        let scaled = values
            .iter()
            .map(|v| Some((v.as_ref()? - mean?) / scale))
            .collect();
        table.set_column(Column::from_f64s(self.output_name(), scaled))?;
        Ok(table)
    }
}

impl StandardScaleArgs {
    pub fn output_name(&self) -> String {
        self.new_col
            .clone()
            .unwrap_or_else(|| format!("{}_scale_standard", self.col))
    }
}

impl MinMaxScaleArgs {
    pub fn output_name(&self) -> String {
        self.new_col
            .clone()
            .unwrap_or_else(|| format!("{}_scale_minmax", self.col))
    }
}

impl Operator for MinMaxScaleArgs {
    fn name(&self) -> &'static str {
        "scale_minmax"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_numeric(input, &self.col, self.name())?;
        Ok(OpPlan::with_output(input, &self.output_name(), DataType::Float))
    }

    fn apply(&self, mut table: Table, ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let values = table.column(&self.col)?.numeric_values()?;
        let (min, max) = match ctx.replayed() {
            Some(Fitted::MinMax { min, max }) => (*min, *max),
            Some(other) => return Err(other.mismatch("min_max")),
            None => {
                let present = stats::present(&values);
                (stats::min(&present), stats::max(&present))
            }
        };
        ctx.record(Fitted::MinMax { min, max });

        let range = match (min, max) {
            (Some(lo), Some(hi)) if hi > lo => hi - lo,
            _ => 1.0,
        };
        let scaled = values
            .iter()
            .map(|v| Some((v.as_ref()? - min?) / range))
            .collect();
        table.set_column(Column::from_f64s(self.output_name(), scaled))?;
        Ok(table)
    }
}
