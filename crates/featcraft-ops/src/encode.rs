//! Categorical encoders: one-hot indicators and target (mean) encoding.
//!
//! Categories are the display form of the cell value, so `3`, `"3"` and
//! `3.0` in an int column all land on the same label.

use std::collections::{BTreeMap, BTreeSet};

use featcraft_core::prelude::{Column, DataType, Scalar, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::fitted::Fitted;
use crate::plan::OpPlan;
use crate::traits::{require_column, require_numeric, OpError, Operator, StepContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnehotArgs {
    pub col: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEncodeArgs {
    pub col: String,
    pub target_col: String,
    #[serde(default)]
    pub new_col: Option<String>,
}

fn label(v: &Scalar) -> Option<String> {
    if v.is_null() {
        None
    } else {
        Some(v.to_string())
    }
}

impl OnehotArgs {
    pub fn indicator_name(&self, category: &str) -> String {
        format!("{}_{}", self.col, category)
    }
}

impl Operator for OnehotArgs {
    fn name(&self) -> &'static str {
        "onehot"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_column(input, &self.col)?;
        let mut plan = OpPlan::new(input.clone());
        plan.dynamic_prefixes.push(format!("{}_", self.col));
        Ok(plan)
    }

    fn apply(&self, mut table: Table, ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let labels: Vec<Option<String>> = table.column(&self.col)?.values.iter().map(label).collect();
        let categories = match ctx.replayed() {
            Some(Fitted::Categories { categories }) => categories.clone(),
            Some(other) => return Err(other.mismatch("categories")),
            None => labels
                .iter()
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let taken: Vec<String> = categories
            .iter()
            .map(|c| self.indicator_name(c))
            .filter(|name| table.has_column(name))
            .collect();
        if !taken.is_empty() {
            return Err(OpError::InvalidArgs(format!(
                "onehot indicators would overwrite existing columns {taken:?}"
            )));
        }

        for category in &categories {
            // Missing and unseen values are all-zero rows.
            let values = labels
                .iter()
                .map(|l| match l {
                    Some(l) if l == category => Scalar::Float(1.0),
                    _ => Scalar::Float(0.0),
                })
                .collect();
            table.set_column(Column::new(
                self.indicator_name(category),
                DataType::Float,
                values,
            ))?;
        }
        ctx.record(Fitted::Categories { categories });
        Ok(table)
    }
}

impl TargetEncodeArgs {
    pub fn output_name(&self) -> String {
        self.new_col
            .clone()
            .unwrap_or_else(|| format!("{}_target_encode", self.col))
    }
}

impl Operator for TargetEncodeArgs {
    fn name(&self) -> &'static str {
        "target_encode"
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.col.clone(), self.target_col.clone()]
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        require_column(input, &self.col)?;
        require_numeric(input, &self.target_col, self.name())?;
        Ok(OpPlan::with_output(input, &self.output_name(), DataType::Float))
    }

    fn apply(&self, mut table: Table, ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let labels: Vec<Option<String>> = table.column(&self.col)?.values.iter().map(label).collect();
        let means = match ctx.replayed() {
            Some(Fitted::TargetMeans { means }) => means.clone(),
            Some(other) => return Err(other.mismatch("target_means")),
            None => {
                let target = table.column(&self.target_col)?.numeric_values()?;
                let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
                for (l, t) in labels.iter().zip(&target) {
                    if let (Some(l), Some(t)) = (l, t) {
                        let entry = sums.entry(l.clone()).or_insert((0.0, 0));
                        entry.0 += t;
                        entry.1 += 1;
                    }
                }
                sums.into_iter()
                    .map(|(k, (sum, n))| (k, sum / n as f64))
                    .collect()
            }
        };

        let encoded = labels
            .iter()
            .map(|l| l.as_ref().and_then(|l| means.get(l).copied()))
            .collect();
        table.set_column(Column::from_f64s(self.output_name(), encoded))?;
        ctx.record(Fitted::TargetMeans { means });
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autogen::PrimitiveSynthesizer;

    fn cities() -> Table {
        let s = |v: &str| Scalar::Str(v.into());
        Table::new(vec![
            Column::new("city", DataType::Str, vec![s("Oslo"), s("Lima"), Scalar::Null, s("Oslo")]),
            Column::new(
                "y",
                DataType::Float,
                vec![Scalar::Float(1.0), Scalar::Float(4.0), Scalar::Float(9.0), Scalar::Float(3.0)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn onehot_emits_sorted_indicators() {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        let out = OnehotArgs { col: "city".into() }
            .apply(cities(), &mut ctx)
            .unwrap();
        assert_eq!(out.column_names(), vec!["city", "y", "city_Lima", "city_Oslo"]);
        assert_eq!(
            out.column("city_Oslo").unwrap().values,
            vec![Scalar::Float(1.0), Scalar::Float(0.0), Scalar::Float(0.0), Scalar::Float(1.0)]
        );
    }

    #[test]
    fn onehot_refuses_to_overwrite_columns() {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        let mut table = cities();
        table
            .set_column(Column::from_f64s("city_Oslo", vec![Some(7.0); 4]))
            .unwrap();
        let err = OnehotArgs { col: "city".into() }
            .apply(table, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidArgs(_)));
    }

    #[test]
    fn onehot_replay_keeps_fitted_columns() {
        let synth = PrimitiveSynthesizer;
        let fitted = Fitted::Categories {
            categories: vec!["Lima".into(), "Oslo".into(), "Rome".into()],
        };
        let mut ctx = StepContext::replay(&synth, Some(&fitted));
        let out = OnehotArgs { col: "city".into() }
            .apply(cities(), &mut ctx)
            .unwrap();
        assert!(out.has_column("city_Rome"));
        assert_eq!(out.column("city_Rome").unwrap().values, vec![Scalar::Float(0.0); 4]);
    }

    #[test]
    fn target_encoding_leaves_unmatched_categories_missing() {
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        let args = TargetEncodeArgs {
            col: "city".into(),
            target_col: "y".into(),
            new_col: None,
        };
        let out = args.apply(cities(), &mut ctx).unwrap();
        assert_eq!(
            out.column("city_target_encode").unwrap().values,
            vec![Scalar::Float(2.0), Scalar::Float(4.0), Scalar::Null, Scalar::Float(2.0)]
        );

        let fitted = ctx.into_recorded().unwrap();
        let mut replay = StepContext::replay(&synth, Some(&fitted));
        let s = |v: &str| Scalar::Str(v.into());
        let unseen = Table::new(vec![
            Column::new("city", DataType::Str, vec![s("Rome"), s("Lima")]),
            Column::new("y", DataType::Float, vec![Scalar::Null, Scalar::Null]),
        ])
        .unwrap();
        let out = args.apply(unseen, &mut replay).unwrap();
        assert_eq!(
            out.column("city_target_encode").unwrap().values,
            vec![Scalar::Null, Scalar::Float(4.0)]
        );
    }
}
