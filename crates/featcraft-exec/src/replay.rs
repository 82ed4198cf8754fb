//! Deterministic replay & provenance helpers.
//!
//! A materialization records the parameters its fitted steps learned. Replaying
//! the same steps with those parameters over new raw rows (same schema) yields
//! the same column set the materialization has, which is what inference needs.

use serde::{Deserialize, Serialize};

use featcraft_core::hash::{hash_serde, Hash256};
use featcraft_core::prelude::Table;
use featcraft_ops::{FeatureSynthesizer, FittedState, Step, StepContext};

use crate::ExecError;

/// Stable digest of a step list.
pub fn hash_steps(steps: &[Step]) -> Result<Hash256, ExecError> {
    hash_serde(&steps).map_err(|e| ExecError::Hash(e.to_string()))
}

/// Stable digest of a table (column order, names, types and values).
pub fn hash_table(table: &Table) -> Result<Hash256, ExecError> {
    hash_serde(table).map_err(|e| ExecError::Hash(e.to_string()))
}

/// Run `steps` over `table` in transform mode, reusing `fitted` parameters.
///
/// Steps without recorded parameters run as they would during a fit.
pub fn replay(
    table: Table,
    steps: &[Step],
    fitted: &FittedState,
    synthesizer: &dyn FeatureSynthesizer,
) -> Result<Table, ExecError> {
    let mut table = table;
    for (step_index, step) in steps.iter().enumerate() {
        let op = step.as_operator();
        let mut ctx = StepContext::replay(synthesizer, fitted.get(step_index));
        table = op.apply(table, &mut ctx).map_err(|e| ExecError::Step {
            step_index,
            op: op.name(),
            reason: e.to_string(),
        })?;
    }
    tracing::debug!(steps = steps.len(), rows = table.num_rows(), "replayed steps");
    Ok(table)
}

/// Everything an inference component needs to rebuild features from raw rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferencePlan {
    pub steps: Vec<Step>,
    pub fitted: FittedState,
}

impl InferencePlan {
    pub fn apply(&self, raw: Table, synthesizer: &dyn FeatureSynthesizer) -> Result<Table, ExecError> {
        replay(raw, &self.steps, &self.fitted, synthesizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Executor;
    use featcraft_core::prelude::{Column, DataType, DatasetSnapshot, Scalar, SnapshotId};
    use featcraft_ops::PrimitiveSynthesizer;
    use featcraft_planner::parse_steps;

    fn raw(cities: &[&str], prices: &[f64]) -> Table {
        Table::new(vec![
            Column::new(
                "city",
                DataType::Str,
                cities.iter().map(|c| Scalar::Str(c.to_string())).collect(),
            ),
            Column::new(
                "price",
                DataType::Float,
                prices.iter().map(|p| Scalar::Float(*p)).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn replay_reuses_fitted_parameters() {
        let steps = parse_steps(
            r#"
- op: onehot
  col: city
- op: scale_minmax
  col: price
"#,
        )
        .unwrap();
        let snapshot = DatasetSnapshot::new(
            SnapshotId::new(9),
            "train",
            raw(&["Oslo", "Lima", "Oslo"], &[10.0, 20.0, 30.0]),
        );
        let mat = Executor::new().execute(&snapshot, &steps).unwrap();

        let plan = InferencePlan {
            steps,
            fitted: mat.fitted.clone(),
        };
        // `Rome` was never seen and must not add a column.
        let out = plan
            .apply(raw(&["Rome", "Lima"], &[20.0, 50.0]), &PrimitiveSynthesizer)
            .unwrap();
        assert_eq!(out.column_names(), mat.column_names());
        assert_eq!(
            out.column("price_scale_minmax").unwrap().values,
            vec![Scalar::Float(0.5), Scalar::Float(2.0)]
        );
        assert_eq!(
            out.column("city_Lima").unwrap().values,
            vec![Scalar::Float(0.0), Scalar::Float(1.0)]
        );
    }

    #[test]
    fn step_hash_changes_with_arguments() {
        let a = parse_steps("- op: lag\n  col: x\n").unwrap();
        let b = parse_steps("- op: lag\n  col: x\n  periods: 2\n").unwrap();
        assert_eq!(hash_steps(&a).unwrap(), hash_steps(&a).unwrap());
        assert_ne!(hash_steps(&a).unwrap(), hash_steps(&b).unwrap());
    }
}
