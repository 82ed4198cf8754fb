//! Ordered, per-group ops: `lag`, `diff` and `rolling`.
//!
//! All three sort rows by `sort_col` (original row order when absent) within
//! `group_col` (one global group when absent) and write their result back at
//! each row's original position; output row order never changes.

use featcraft_core::prelude::{Column, Scalar, Schema, Table};
use featcraft_core::stats;
use serde::{Deserialize, Serialize};

use crate::groupby::AggFunc;
use crate::partition::{grouped_rows, ColumnList};
use crate::plan::OpPlan;
use crate::traits::{require_column, require_numeric, OpError, Operator, StepContext};

fn default_periods() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagArgs {
    pub col: String,
    #[serde(default)]
    pub group_col: Option<ColumnList>,
    #[serde(default)]
    pub sort_col: Option<String>,
    #[serde(default = "default_periods")]
    pub periods: usize,
    #[serde(default)]
    pub new_col: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffArgs {
    pub col: String,
    #[serde(default)]
    pub group_col: Option<ColumnList>,
    #[serde(default)]
    pub sort_col: Option<String>,
    #[serde(default = "default_periods")]
    pub periods: usize,
    #[serde(default)]
    pub new_col: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingArgs {
    pub col: String,
    pub window: usize,
    pub func: AggFunc,
    #[serde(default)]
    pub group_col: Option<ColumnList>,
    #[serde(default)]
    pub sort_col: Option<String>,
    #[serde(default)]
    pub new_col: Option<String>,
}

/// Shared ordering arguments.
fn ordered_groups(
    table: &Table,
    group_col: &Option<ColumnList>,
    sort_col: &Option<String>,
) -> Result<Vec<Vec<usize>>, OpError> {
    let groups = group_col.as_ref().map(ColumnList::to_vec).unwrap_or_default();
    grouped_rows(table, &groups, sort_col.as_deref())
}

fn check_ordering(
    input: &Schema,
    group_col: &Option<ColumnList>,
    sort_col: &Option<String>,
) -> Result<(), OpError> {
    if let Some(groups) = group_col {
        for g in groups.to_vec() {
            require_column(input, &g)?;
        }
    }
    if let Some(sort) = sort_col {
        require_column(input, sort)?;
    }
    Ok(())
}

fn ordering_inputs(col: &str, group_col: &Option<ColumnList>, sort_col: &Option<String>) -> Vec<String> {
    let mut cols = vec![col.to_string()];
    if let Some(groups) = group_col {
        cols.extend(groups.to_vec());
    }
    cols.extend(sort_col.clone());
    cols
}

impl LagArgs {
    pub fn output_name(&self) -> String {
        self.new_col
            .clone()
            .unwrap_or_else(|| format!("{}_lag_{}", self.col, self.periods))
    }
}

impl Operator for LagArgs {
    fn name(&self) -> &'static str {
        "lag"
    }

    fn inputs(&self) -> Vec<String> {
        ordering_inputs(&self.col, &self.group_col, &self.sort_col)
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        let dt = input
            .data_type_of(&self.col)
            .ok_or_else(|| OpError::MissingColumn(self.col.clone()))?;
        check_ordering(input, &self.group_col, &self.sort_col)?;
        Ok(OpPlan::with_output(input, &self.output_name(), dt))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let source = table.column(&self.col)?;
        let mut out = vec![Scalar::Null; table.num_rows()];
        for rows in ordered_groups(&table, &self.group_col, &self.sort_col)? {
            for (pos, &row) in rows.iter().enumerate().skip(self.periods) {
                out[row] = source.values[rows[pos - self.periods]].clone();
            }
        }
        let column = Column::new(self.output_name(), source.data_type, out);
        table.set_column(column)?;
        Ok(table)
    }
}

impl DiffArgs {
    pub fn output_name(&self) -> String {
        self.new_col
            .clone()
            .unwrap_or_else(|| format!("{}_diff_{}", self.col, self.periods))
    }
}

impl Operator for DiffArgs {
    fn name(&self) -> &'static str {
        "diff"
    }

    fn inputs(&self) -> Vec<String> {
        ordering_inputs(&self.col, &self.group_col, &self.sort_col)
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_numeric(input, &self.col, "diff")?;
        check_ordering(input, &self.group_col, &self.sort_col)?;
        Ok(OpPlan::with_output(
            input,
            &self.output_name(),
            featcraft_core::schema::DataType::Float,
        ))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let values = table.column(&self.col)?.numeric_values()?;
        let mut out = vec![None; table.num_rows()];
        for rows in ordered_groups(&table, &self.group_col, &self.sort_col)? {
            for (pos, &row) in rows.iter().enumerate().skip(self.periods) {
                let prior = values[rows[pos - self.periods]];
                out[row] = values[row].zip(prior).map(|(x, p)| x - p);
            }
        }
        table.set_column(Column::from_f64s(self.output_name(), out))?;
        Ok(table)
    }
}

impl RollingArgs {
    pub fn output_name(&self) -> String {
        self.new_col.clone().unwrap_or_else(|| {
            format!("{}_rolling_{}_{}", self.col, self.window, self.func.name())
        })
    }

    /// Aggregate over one full window. Count tallies present values; the
    /// other functions need every value in the window to be present.
    fn window_value(&self, window: &[Option<f64>]) -> Scalar {
        let present: Vec<f64> = window.iter().flatten().copied().collect();
        match self.func {
            AggFunc::Count => Scalar::Int(present.len() as i64),
            _ if present.len() < window.len() => Scalar::Null,
            AggFunc::Std => Scalar::from_opt_f64(stats::std_dev(&present, 1)),
            func => func.over(&present),
        }
    }
}

impl Operator for RollingArgs {
    fn name(&self) -> &'static str {
        "rolling"
    }

    fn inputs(&self) -> Vec<String> {
        ordering_inputs(&self.col, &self.group_col, &self.sort_col)
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        if self.window == 0 {
            return Err(OpError::InvalidArgs("rolling window must be at least 1".into()));
        }
        require_numeric(input, &self.col, "rolling")?;
        check_ordering(input, &self.group_col, &self.sort_col)?;
        Ok(OpPlan::with_output(input, &self.output_name(), self.func.output_type()))
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        if self.window == 0 {
            return Err(OpError::InvalidArgs("rolling window must be at least 1".into()));
        }
        let values = table.column(&self.col)?.numeric_values()?;
        let mut out = vec![Scalar::Null; table.num_rows()];
        for rows in ordered_groups(&table, &self.group_col, &self.sort_col)? {
            let ordered: Vec<Option<f64>> = rows.iter().map(|&r| values[r]).collect();
            for (pos, &row) in rows.iter().enumerate() {
                if pos + 1 < self.window {
                    continue;
                }
                out[row] = self.window_value(&ordered[pos + 1 - self.window..=pos]);
            }
        }
        table.set_column(Column::new(self.output_name(), self.func.output_type(), out))?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autogen::PrimitiveSynthesizer;
    use featcraft_core::prelude::DataType;

    fn series() -> Table {
        let s = |v: &str| Scalar::Str(v.into());
        Table::new(vec![
            Column::new("g", DataType::Str, vec![s("x"), s("y"), s("x"), s("x"), s("y")]),
            Column::new(
                "t",
                DataType::Int,
                vec![Scalar::Int(3), Scalar::Int(1), Scalar::Int(1), Scalar::Int(2), Scalar::Int(2)],
            ),
            Column::new(
                "v",
                DataType::Float,
                vec![
                    Scalar::Float(30.0),
                    Scalar::Float(100.0),
                    Scalar::Float(10.0),
                    Scalar::Float(20.0),
                    Scalar::Null,
                ],
            ),
        ])
        .unwrap()
    }

    fn apply(op: &dyn Operator, table: Table) -> Table {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        op.apply(table, &mut ctx).unwrap()
    }

    #[test]
    fn lag_shifts_within_group_in_sort_order() {
        let lag = LagArgs {
            col: "v".into(),
            group_col: Some("g".into()),
            sort_col: Some("t".into()),
            periods: 1,
            new_col: None,
        };
        let out = apply(&lag, series());
        assert_eq!(
            out.column("v_lag_1").unwrap().values,
            vec![
                Scalar::Float(20.0),
                Scalar::Null,
                Scalar::Null,
                Scalar::Float(10.0),
                Scalar::Float(100.0),
            ]
        );
    }

    #[test]
    fn diff_propagates_missing_values() {
        let diff = DiffArgs {
            col: "v".into(),
            group_col: Some("g".into()),
            sort_col: Some("t".into()),
            periods: 1,
            new_col: Some("dv".into()),
        };
        let out = apply(&diff, series());
        assert_eq!(
            out.column("dv").unwrap().values,
            vec![Scalar::Float(10.0), Scalar::Null, Scalar::Null, Scalar::Float(10.0), Scalar::Null]
        );
    }

    #[test]
    fn rolling_requires_full_window() {
        let rolling = RollingArgs {
            col: "v".into(),
            window: 2,
            func: AggFunc::Mean,
            group_col: Some("g".into()),
            sort_col: Some("t".into()),
            new_col: None,
        };
        let out = apply(&rolling, series());
        assert_eq!(
            out.column("v_rolling_2_mean").unwrap().values,
            vec![Scalar::Float(25.0), Scalar::Null, Scalar::Null, Scalar::Float(15.0), Scalar::Null]
        );

        let count = RollingArgs {
            func: AggFunc::Count,
            ..rolling
        };
        let out = apply(&count, series());
        assert_eq!(out.column("v_rolling_2_count").unwrap().values[4], Scalar::Int(1));
    }

    #[test]
    fn global_lag_uses_row_order_without_sort_col() {
        let lag = LagArgs {
            col: "g".into(),
            group_col: None,
            sort_col: None,
            periods: 2,
            new_col: None,
        };
        let out = apply(&lag, series());
        let lagged = &out.column("g_lag_2").unwrap();
        assert_eq!(lagged.data_type, DataType::Str);
        assert_eq!(lagged.values[2], Scalar::Str("x".into()));
        assert_eq!(lagged.values[0], Scalar::Null);
    }

    #[test]
    fn plan_checks_ordering_columns() {
        let schema = series().schema();
        let mut rolling = RollingArgs {
            col: "v".into(),
            window: 0,
            func: AggFunc::Max,
            group_col: None,
            sort_col: None,
            new_col: None,
        };
        assert!(matches!(rolling.plan(&schema), Err(OpError::InvalidArgs(_))));
        rolling.window = 3;
        rolling.sort_col = Some("when".into());
        assert!(matches!(rolling.plan(&schema), Err(OpError::MissingColumn(c)) if c == "when"));
    }
}
