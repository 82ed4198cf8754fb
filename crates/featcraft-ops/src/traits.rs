//! Operator trait + common interfaces.
//!
//! The executor calls `plan(...)` while validating a step list, then
//! `apply(...)` in step order. Both must be deterministic given the same
//! inputs (and, for learned parameters, the same fitted state).

use featcraft_core::prelude::{Schema, Table};
use thiserror::Error;

use crate::fitted::Fitted;
use crate::plan::OpPlan;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("execution error: {0}")]
    Exec(String),
}

impl From<featcraft_core::Error> for OpError {
    fn from(e: featcraft_core::Error) -> Self {
        match e {
            featcraft_core::Error::ColumnNotFound(name) => OpError::MissingColumn(name),
            featcraft_core::Error::TypeMismatch { .. } => OpError::InvalidArgs(e.to_string()),
            other => OpError::Schema(other.to_string()),
        }
    }
}

/// Trait that all step argument types implement.
pub trait Operator: Send + Sync {
    /// Stable op name, as written in step lists.
    fn name(&self) -> &'static str;

    /// Columns the step reads; each must exist when the step runs.
    fn inputs(&self) -> Vec<String>;

    /// Validate against the schema visible at this step and describe the output.
    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError>;

    /// Transform the table.
    fn apply(&self, table: Table, ctx: &mut StepContext<'_>) -> Result<Table, OpError>;
}

/// Delegation seam for automated feature synthesis: table in, extended table out.
///
/// Implementations must only append columns; existing columns and row order
/// are left untouched.
pub trait FeatureSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn synthesize(&self, table: &Table, source_columns: &[String]) -> Result<Table, OpError>;
}

/// Per-step execution context.
///
/// In fit mode `replayed` is empty and ops learn their parameters from the
/// data; in replay mode they reuse the parameters recorded by an earlier fit.
/// Either way the parameters actually used end up in `recorded`.
pub struct StepContext<'a> {
    pub synthesizer: &'a dyn FeatureSynthesizer,
    replayed: Option<&'a Fitted>,
    recorded: Option<Fitted>,
}

impl<'a> StepContext<'a> {
    pub fn fit(synthesizer: &'a dyn FeatureSynthesizer) -> Self {
        Self {
            synthesizer,
            replayed: None,
            recorded: None,
        }
    }

    pub fn replay(synthesizer: &'a dyn FeatureSynthesizer, fitted: Option<&'a Fitted>) -> Self {
        Self {
            synthesizer,
            replayed: fitted,
            recorded: None,
        }
    }

    pub fn replayed(&self) -> Option<&'a Fitted> {
        self.replayed
    }

    pub fn record(&mut self, fitted: Fitted) {
        self.recorded = Some(fitted);
    }

    pub fn into_recorded(self) -> Option<Fitted> {
        self.recorded
    }
}

/// Numeric-type guard shared by the ops that do arithmetic.
pub(crate) fn require_numeric(schema: &Schema, col: &str, op: &str) -> Result<(), OpError> {
    match schema.data_type_of(col) {
        None => Err(OpError::MissingColumn(col.to_string())),
        Some(dt) if dt.is_numeric() || dt == featcraft_core::schema::DataType::Bool => Ok(()),
        Some(dt) => Err(OpError::InvalidArgs(format!(
            "{op} needs a numeric column, '{col}' is {dt}"
        ))),
    }
}

pub(crate) fn require_column(schema: &Schema, col: &str) -> Result<(), OpError> {
    if schema.contains(col) {
        Ok(())
    } else {
        Err(OpError::MissingColumn(col.to_string()))
    }
}
