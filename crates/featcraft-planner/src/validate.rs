//! Static validation: plan each step against the schema visible at its
//! position, before any data is touched.

use featcraft_core::prelude::{DataType, Field, Schema};
use featcraft_ops::{OpError, OpPlan, Operator, Step};
use thiserror::Error;

/// A rejected step, with its position in the list.
#[derive(Debug, Error)]
#[error("step {step_index} ({op}): {source}")]
pub struct ValidationError {
    pub step_index: usize,
    pub op: &'static str,
    #[source]
    pub source: OpError,
}

impl ValidationError {
    pub fn reason(&self) -> String {
        self.source.to_string()
    }

    pub fn is_missing_column(&self) -> bool {
        matches!(self.source, OpError::MissingColumn(_))
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedPipeline {
    /// One plan per step, in order.
    pub plans: Vec<OpPlan>,

    /// Schema after the last step. Columns whose names depend on the data
    /// (one-hot indicators) appear only once a later step referenced them.
    pub output_schema: Schema,
}

/// Validate `steps` against the source `schema`.
///
/// A column that matches a data-dependent prefix announced by an earlier
/// step (e.g. `region_` after `onehot(region)`) is assumed to exist as a
/// Float column, unless a later step in the list is the one that creates
/// it. The executor re-plans every step against the real table, so an
/// indicator that was never emitted still fails as a missing column.
pub fn validate_steps(schema: &Schema, steps: &[Step]) -> Result<ValidatedPipeline, ValidationError> {
    let mut current = schema.clone();
    let mut dynamic_prefixes: Vec<String> = Vec::new();
    // (step that first referenced it, column) for every deferred indicator
    let mut assumed: Vec<(usize, String)> = Vec::new();
    let mut plans = Vec::with_capacity(steps.len());

    for (step_index, step) in steps.iter().enumerate() {
        let op = step.as_operator();
        let fail = |source: OpError| ValidationError {
            step_index,
            op: op.name(),
            source,
        };

        let plan = loop {
            match op.plan(&current) {
                Ok(plan) => break plan,
                Err(OpError::MissingColumn(name))
                    if !current.contains(&name)
                        && dynamic_prefixes.iter().any(|p| name.starts_with(p.as_str())) =>
                {
                    current.upsert(Field::new(name.clone(), DataType::Float));
                    assumed.push((step_index, name));
                }
                Err(e) => return Err(fail(e)),
            }
        };

        if let Some((at, name)) = created_after_use(op, &current, &assumed, step_index) {
            return Err(ValidationError {
                step_index: at,
                op: steps[at].as_operator().name(),
                source: OpError::MissingColumn(name),
            });
        }

        dynamic_prefixes.extend(plan.dynamic_prefixes.iter().cloned());
        current = plan.output_schema.clone();
        plans.push(plan);
    }

    Ok(ValidatedPipeline {
        plans,
        output_schema: current,
    })
}

/// A deferred indicator that this step turns out to create itself was a
/// forward reference, not an indicator.
fn created_after_use(
    op: &dyn Operator,
    current: &Schema,
    assumed: &[(usize, String)],
    step_index: usize,
) -> Option<(usize, String)> {
    if assumed.is_empty() {
        return None;
    }
    let mut bare = current.clone();
    for (_, name) in assumed {
        bare.remove(name);
    }
    let plan = op.plan(&bare).ok()?;
    assumed
        .iter()
        .find(|(at, name)| *at < step_index && plan.created.contains(name))
        .cloned()
}
