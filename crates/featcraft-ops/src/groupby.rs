//! `groupby_agg`: per-group statistics, either broadcast to every member row
//! or computed "as of" each row from strictly earlier rows only.

use featcraft_core::prelude::{Column, DataType, Scalar, Schema, Table};
use featcraft_core::stats;
use featcraft_core::types::scalar_cmp;
use serde::{Deserialize, Serialize};

use crate::partition::{grouped_rows, ColumnList};
use crate::plan::OpPlan;
use crate::traits::{require_column, require_numeric, OpError, Operator, StepContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Mean,
    Max,
    Min,
    Std,
    Count,
}

impl AggFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Mean => "mean",
            AggFunc::Max => "max",
            AggFunc::Min => "min",
            AggFunc::Std => "std",
            AggFunc::Count => "count",
        }
    }

    pub fn output_type(self) -> DataType {
        match self {
            AggFunc::Count => DataType::Int,
            _ => DataType::Float,
        }
    }

    /// Aggregate present values. Std is the sample deviation (n-1).
    pub fn over(self, xs: &[f64]) -> Scalar {
        match self {
            AggFunc::Count => Scalar::Int(xs.len() as i64),
            AggFunc::Mean => Scalar::from_opt_f64(stats::mean(xs)),
            AggFunc::Max => Scalar::from_opt_f64(stats::max(xs)),
            AggFunc::Min => Scalar::from_opt_f64(stats::min(xs)),
            AggFunc::Std => Scalar::from_opt_f64(stats::std_dev(xs, 1)),
        }
    }
}

/// Incremental aggregate state (Welford for mean/std).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    pub fn value(&self, func: AggFunc) -> Scalar {
        match func {
            AggFunc::Count => Scalar::Int(self.count as i64),
            _ if self.count == 0 => Scalar::Null,
            AggFunc::Mean => Scalar::from_f64(self.mean),
            AggFunc::Min => Scalar::from_opt_f64(self.min),
            AggFunc::Max => Scalar::from_opt_f64(self.max),
            AggFunc::Std if self.count < 2 => Scalar::Null,
            AggFunc::Std => Scalar::from_f64((self.m2 / (self.count - 1) as f64).sqrt()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupbyAggArgs {
    /// Value column(s) to aggregate.
    #[serde(alias = "col")]
    pub cols: ColumnList,
    pub group_col: ColumnList,
    pub func: AggFunc,
    #[serde(default)]
    pub date_col: Option<String>,
    #[serde(default)]
    pub threshold_min: Option<f64>,
    #[serde(default)]
    pub threshold_max: Option<f64>,
    #[serde(default)]
    pub new_col: Option<String>,
}

impl GroupbyAggArgs {
    fn output_name(&self, col: &str) -> String {
        match &self.new_col {
            Some(name) => name.clone(),
            None => format!("{col}_groupby_agg"),
        }
    }

    fn in_range(&self, x: f64) -> bool {
        self.threshold_min.map_or(true, |lo| x >= lo) && self.threshold_max.map_or(true, |hi| x <= hi)
    }

    /// Values with out-of-range entries blanked; rows are kept.
    fn prefiltered(&self, column: &Column) -> Result<Vec<Option<f64>>, OpError> {
        if self.func == AggFunc::Count && !column.data_type.is_numeric() {
            return Ok(column
                .values
                .iter()
                .map(|v| if v.is_null() { None } else { Some(1.0) })
                .collect());
        }
        Ok(column
            .numeric_values()?
            .into_iter()
            .map(|v| v.filter(|x| self.in_range(*x)))
            .collect())
    }

    fn broadcast(&self, values: &[Option<f64>], groups: &[Vec<usize>], n: usize) -> Vec<Scalar> {
        let mut out = vec![Scalar::Null; n];
        for rows in groups {
            let xs: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
            let agg = self.func.over(&xs);
            for &r in rows {
                out[r] = agg.clone();
            }
        }
        out
    }

    fn as_of(
        &self,
        values: &[Option<f64>],
        dates: &[Scalar],
        groups: &[Vec<usize>],
        n: usize,
    ) -> Vec<Scalar> {
        let mut out = vec![Scalar::Null; n];
        for rows in groups {
            // rows arrive sorted by date, nulls first
            let dated: Vec<usize> = rows.iter().copied().filter(|&r| !dates[r].is_null()).collect();
            let mut acc = Accumulator::default();
            let mut start = 0;
            while start < dated.len() {
                let mut end = start + 1;
                while end < dated.len()
                    && scalar_cmp(&dates[dated[end]], &dates[dated[start]]).is_eq()
                {
                    end += 1;
                }
                for &r in &dated[start..end] {
                    out[r] = acc.value(self.func);
                }
                for &r in &dated[start..end] {
                    if let Some(x) = values[r] {
                        acc.push(x);
                    }
                }
                start = end;
            }
        }
        out
    }
}

impl Operator for GroupbyAggArgs {
    fn name(&self) -> &'static str {
        "groupby_agg"
    }

    fn inputs(&self) -> Vec<String> {
        let mut cols = self.cols.to_vec();
        cols.extend(self.group_col.to_vec());
        cols.extend(self.date_col.clone());
        cols
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        let cols = self.cols.to_vec();
        if cols.is_empty() || self.group_col.is_empty() {
            return Err(OpError::InvalidArgs(
                "groupby_agg needs at least one value column and one group column".into(),
            ));
        }
        if self.new_col.is_some() && cols.len() > 1 {
            return Err(OpError::InvalidArgs(
                "new_col can only be set when aggregating a single column".into(),
            ));
        }
        if let (Some(lo), Some(hi)) = (self.threshold_min, self.threshold_max) {
            if lo > hi {
                return Err(OpError::InvalidArgs(format!(
                    "threshold_min {lo} is greater than threshold_max {hi}"
                )));
            }
        }
        for g in self.group_col.to_vec() {
            require_column(input, &g)?;
        }
        if let Some(date) = &self.date_col {
            require_column(input, date)?;
        }

        let mut plan = OpPlan::new(input.clone());
        for col in &cols {
            if self.func == AggFunc::Count {
                require_column(input, col)?;
            } else {
                require_numeric(input, col, "groupby_agg")?;
            }
            let step = OpPlan::with_output(&plan.output_schema, &self.output_name(col), self.func.output_type());
            plan.output_schema = step.output_schema;
            plan.created.extend(step.created);
            plan.mutated.extend(step.mutated);
        }
        Ok(plan)
    }

    fn apply(&self, mut table: Table, _ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let n = table.num_rows();
        let group_cols = self.group_col.to_vec();
        let groups = grouped_rows(&table, &group_cols, self.date_col.as_deref())?;
        let dates: Option<Vec<Scalar>> = match &self.date_col {
            Some(d) => Some(table.column(d)?.values.iter().map(Scalar::sortable).collect()),
            None => None,
        };

        let mut outputs = Vec::new();
        for col in self.cols.to_vec() {
            let values = self.prefiltered(table.column(&col)?)?;
            let out = match &dates {
                Some(dates) => self.as_of(&values, dates, &groups, n),
                None => self.broadcast(&values, &groups, n),
            };
            outputs.push(Column::new(self.output_name(&col), self.func.output_type(), out));
        }
        for column in outputs {
            table.set_column(column)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autogen::PrimitiveSynthesizer;

    fn sales() -> Table {
        let s = |v: &str| Scalar::Str(v.into());
        Table::new(vec![
            Column::new("store", DataType::Str, vec![s("a"), s("a"), s("a"), s("b"), s("a")]),
            Column::new(
                "day",
                DataType::Str,
                vec![s("2024-01-01"), s("2024-01-02"), s("2024-01-03"), s("2024-01-01"), s("2024-01-02")],
            ),
            Column::new(
                "amount",
                DataType::Float,
                vec![
                    Scalar::Float(10.0),
                    Scalar::Float(20.0),
                    Scalar::Float(30.0),
                    Scalar::Float(5.0),
                    Scalar::Float(40.0),
                ],
            ),
        ])
        .unwrap()
    }

    fn run(args: GroupbyAggArgs, table: Table) -> Table {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        args.apply(table, &mut ctx).unwrap()
    }

    fn args(func: AggFunc, date_col: Option<&str>) -> GroupbyAggArgs {
        GroupbyAggArgs {
            cols: "amount".into(),
            group_col: "store".into(),
            func,
            date_col: date_col.map(String::from),
            threshold_min: None,
            threshold_max: None,
            new_col: None,
        }
    }

    #[test]
    fn broadcast_mean_per_group() {
        let out = run(args(AggFunc::Mean, None), sales());
        let values = &out.column("amount_groupby_agg").unwrap().values;
        assert_eq!(values[0], Scalar::Float(25.0));
        assert_eq!(values[3], Scalar::Float(5.0));
        assert_eq!(values[4], Scalar::Float(25.0));
    }

    #[test]
    fn as_of_uses_strictly_earlier_dates() {
        let out = run(args(AggFunc::Mean, Some("day")), sales());
        let values = &out.column("amount_groupby_agg").unwrap().values;
        // day 1 has no history; both day-2 rows see only day 1
        assert_eq!(values[0], Scalar::Null);
        assert_eq!(values[1], Scalar::Float(10.0));
        assert_eq!(values[4], Scalar::Float(10.0));
        assert!((values[2].as_f64().unwrap() - 70.0 / 3.0).abs() < 1e-9);
        assert_eq!(values[3], Scalar::Null);

        let counts = run(args(AggFunc::Count, Some("day")), sales());
        assert_eq!(
            counts.column("amount_groupby_agg").unwrap().values,
            vec![Scalar::Int(0), Scalar::Int(1), Scalar::Int(3), Scalar::Int(0), Scalar::Int(1)]
        );
    }

    #[test]
    fn thresholds_blank_values_but_keep_rows() {
        let mut a = args(AggFunc::Max, None);
        a.threshold_max = Some(25.0);
        let out = run(a, sales());
        assert_eq!(out.num_rows(), 5);
        let values = &out.column("amount_groupby_agg").unwrap().values;
        assert_eq!(values[0], Scalar::Float(20.0));
        assert_eq!(values[2], Scalar::Float(20.0));
    }

    #[test]
    fn composite_keys_and_new_col_rules() {
        let mut a = args(AggFunc::Count, None);
        a.group_col = ColumnList::Many(vec!["store".into(), "day".into()]);
        a.new_col = Some("n".into());
        let out = run(a.clone(), sales());
        assert_eq!(out.column("n").unwrap().values[1], Scalar::Int(1));

        a.cols = ColumnList::Many(vec!["amount".into(), "day".into()]);
        assert!(a.plan(&sales().schema()).is_err());
    }

    #[test]
    fn plan_rejects_text_values_for_mean() {
        let mut a = args(AggFunc::Mean, None);
        a.cols = "day".into();
        assert!(matches!(a.plan(&sales().schema()), Err(OpError::InvalidArgs(_))));
        a.group_col = "missing".into();
        assert!(matches!(a.plan(&sales().schema()), Err(OpError::MissingColumn(_))));
    }
}
