//! Runtime: run a step list over a snapshot and emit a `Materialization`.
//!
//! - Validates the whole list first; nothing runs if any step is rejected.
//! - Applies steps in order on a private copy of the snapshot table.
//! - Records which step created each column and the parameters fitted steps
//!   learned, so the list can be replayed on unseen rows.
//! - Checks the cancel flag before every step and reports progress after it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use featcraft_core::prelude::{DatasetSnapshot, Hash256, RunManifest, Schema, SnapshotId, Table};
use featcraft_ops::{FeatureSynthesizer, FittedState, PrimitiveSynthesizer, Step, StepContext};
use featcraft_planner::{validate_steps, ValidationError};

use crate::metrics::emit_span;
use crate::replay::{hash_steps, hash_table};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("step {step_index} ({op}) failed: {reason}")]
    Step {
        step_index: usize,
        op: &'static str,
        reason: String,
    },

    #[error("cancelled before step {step_index}")]
    Cancelled { step_index: usize },

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("hashing error: {0}")]
    Hash(String),
}

impl ExecError {
    /// Index of the step the error is attributed to, if any.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            ExecError::Validation(e) => Some(e.step_index),
            ExecError::Step { step_index, .. } | ExecError::Cancelled { step_index } => {
                Some(*step_index)
            }
            _ => None,
        }
    }
}

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Cancellation flag and progress sink for one run.
#[derive(Clone, Default)]
pub struct RunControl {
    cancel: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `f(completed, total)` after every unit of work.
    pub fn with_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    /// Share an existing flag (e.g. one owned by a job handle).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn report(&self, completed: usize, total: usize) {
        if let Some(f) = &self.progress {
            f(completed, total);
        }
    }
}

impl std::fmt::Debug for RunControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunControl")
            .field("cancelled", &self.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Immutable result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Materialization {
    pub snapshot_id: SnapshotId,
    pub table: Table,
    pub schema: Schema,

    /// Column name → index of the step that created it.
    pub created_columns: BTreeMap<String, usize>,

    /// Parameters learned by fitted steps, keyed by step index.
    pub fitted: FittedState,

    pub manifest: RunManifest,
}

impl Materialization {
    pub fn digest(&self) -> Option<Hash256> {
        self.manifest.outputs_digest
    }

    pub fn column_names(&self) -> Vec<String> {
        self.table.column_names()
    }
}

/// Executor owns the synthesizer used by `feature_synthesis` generation.
#[derive(Clone)]
pub struct Executor {
    synthesizer: Arc<dyn FeatureSynthesizer>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            synthesizer: Arc::new(PrimitiveSynthesizer),
        }
    }

    pub fn with_synthesizer(synthesizer: Arc<dyn FeatureSynthesizer>) -> Self {
        Self { synthesizer }
    }

    pub fn synthesizer(&self) -> &dyn FeatureSynthesizer {
        self.synthesizer.as_ref()
    }

    pub fn execute(&self, snapshot: &DatasetSnapshot, steps: &[Step]) -> Result<Materialization, ExecError> {
        self.execute_with(snapshot, steps, &RunControl::default())
    }

    pub fn execute_with(
        &self,
        snapshot: &DatasetSnapshot,
        steps: &[Step],
        control: &RunControl,
    ) -> Result<Materialization, ExecError> {
        validate_steps(snapshot.schema(), steps)?;

        let started_ms = now_millis();
        let manifest = RunManifest::start(snapshot.id, hash_steps(steps)?, steps.len(), started_ms)
            .with_inputs(hash_table(snapshot.table())?);

        let total = steps.len();
        let mut table = snapshot.table().clone();
        let mut created_columns: BTreeMap<String, usize> = BTreeMap::new();
        let mut fitted = FittedState::default();

        for (step_index, step) in steps.iter().enumerate() {
            if control.is_cancelled() {
                tracing::info!(step_index, "materialization cancelled");
                return Err(ExecError::Cancelled { step_index });
            }

            let op = step.as_operator();
            // Columns deferred by static validation (one-hot indicators) are
            // checked against the real table here.
            op.plan(&table.schema()).map_err(|source| ValidationError {
                step_index,
                op: op.name(),
                source,
            })?;
            let before = table.column_names();
            let timer = Instant::now();

            let mut ctx = StepContext::fit(self.synthesizer.as_ref());
            table = op.apply(table, &mut ctx).map_err(|e| ExecError::Step {
                step_index,
                op: op.name(),
                reason: e.to_string(),
            })?;
            if let Some(state) = ctx.into_recorded() {
                fitted.insert(step_index, state);
            }

            let after = table.column_names();
            for name in &after {
                if !before.contains(name) {
                    created_columns.insert(name.clone(), step_index);
                }
            }
            created_columns.retain(|name, _| after.contains(name));

            tracing::debug!(
                step_index,
                op = op.name(),
                rows = table.num_rows(),
                columns = table.num_columns(),
                elapsed_us = timer.elapsed().as_micros() as u64,
                "executed step"
            );
            control.report(step_index + 1, total);
        }

        let digest = hash_table(&table)?;
        let manifest = manifest.finish(now_millis(), digest);
        emit_span(
            "materialize",
            &[
                ("snapshot", snapshot.id.to_string()),
                ("steps", total.to_string()),
                ("rows", table.num_rows().to_string()),
                ("digest", digest.short_hex(8)),
            ],
        );

        Ok(Materialization {
            snapshot_id: snapshot.id,
            schema: table.schema(),
            table,
            created_columns,
            fitted,
            manifest,
        })
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use featcraft_core::prelude::{Column, DataType, Scalar};
    use featcraft_planner::parse_steps;
    use std::sync::atomic::AtomicUsize;

    fn snapshot() -> DatasetSnapshot {
        let table = Table::new(vec![
            Column::new(
                "store",
                DataType::Str,
                vec![
                    Scalar::Str("a".into()),
                    Scalar::Str("a".into()),
                    Scalar::Str("b".into()),
                ],
            ),
            Column::new("t", DataType::Int, vec![Scalar::Int(2), Scalar::Int(1), Scalar::Int(1)]),
            Column::new(
                "sales",
                DataType::Float,
                vec![Scalar::Float(20.0), Scalar::Float(10.0), Scalar::Float(7.0)],
            ),
        ])
        .unwrap();
        DatasetSnapshot::new(SnapshotId::new(1), "sales", table)
    }

    fn steps() -> Vec<Step> {
        parse_steps(
            r#"
- op: lag
  col: sales
  group_col: store
  sort_col: t
- op: scale_standard
  col: sales
- op: drop_columns
  columns: [t]
"#,
        )
        .unwrap()
    }

    #[test]
    fn records_created_columns_and_fitted_state() {
        let mat = Executor::new().execute(&snapshot(), &steps()).unwrap();
        assert_eq!(mat.created_columns.get("sales_lag_1"), Some(&0));
        assert_eq!(mat.created_columns.get("sales_scale_standard"), Some(&1));
        assert!(!mat.schema.contains("t"));
        assert!(mat.fitted.get(1).is_some());
        assert_eq!(
            mat.table.column("sales_lag_1").unwrap().values,
            vec![Scalar::Float(10.0), Scalar::Null, Scalar::Null]
        );
        assert_eq!(mat.digest(), Some(hash_table(&mat.table).unwrap()));
    }

    #[test]
    fn same_inputs_same_table_and_digest() {
        let exec = Executor::new();
        let a = exec.execute(&snapshot(), &steps()).unwrap();
        let b = exec.execute(&snapshot(), &steps()).unwrap();
        assert_eq!(a.table, b.table);
        assert_eq!(a.digest(), b.digest());
        assert!(a.manifest.reproduces(&b.manifest));
    }

    #[test]
    fn rejected_step_runs_nothing() {
        let steps = parse_steps(
            r#"
- op: lag
  col: sales
- op: log
  col: store
"#,
        )
        .unwrap();
        let err = Executor::new().execute(&snapshot(), &steps).unwrap_err();
        assert!(matches!(err, ExecError::Validation(_)));
        assert_eq!(err.step_index(), Some(1));
    }

    #[test]
    fn failing_step_reports_index_and_op() {
        let steps = parse_steps(
            r#"
- op: log
  col: sales
- op: auto_gen
  method: arithmetic
  source_columns: [sales, sales_log]
  generated_columns: [sales_pow_sales_log]
"#,
        )
        .unwrap();
        match Executor::new().execute(&snapshot(), &steps) {
            Err(ExecError::Step { step_index, op, .. }) => {
                assert_eq!(step_index, 1);
                assert_eq!(op, "auto_gen");
            }
            other => panic!("expected step failure, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_stops_before_next_step() {
        let control = RunControl::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let cancel_on_first = control.clone();
        let control = control.with_progress(move |done, _| {
            seen_in_cb.store(done, Ordering::SeqCst);
            cancel_on_first.cancel();
        });
        let err = Executor::new()
            .execute_with(&snapshot(), &steps(), &control)
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { step_index: 1 }));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
