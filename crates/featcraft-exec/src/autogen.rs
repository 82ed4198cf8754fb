//! Auto-generation: emit candidate columns, prune them, and describe the
//! survivors as one `auto_gen` provenance step.
//!
//! Pruning runs in generation order:
//! 1. drop constant columns, then columns whose variance is below the
//!    variance threshold;
//! 2. drop any later column whose |Pearson| with an already-kept column
//!    exceeds the correlation threshold.
//!
//! Missing values are mean-filled for pruning only; the emitted columns keep
//! their missing cells.

use featcraft_core::prelude::{Column, DataType, Table};
use featcraft_core::stats;
use featcraft_ops::autogen::{generate_columns, AutoGenArgs, GenMethod};
use featcraft_ops::{FeatureSynthesizer, Step};
use serde::{Deserialize, Serialize};

use crate::metrics::emit_span;
use crate::runtime::{ExecError, RunControl};

fn default_variance_threshold() -> f64 {
    0.0
}

fn default_correlation_threshold() -> f64 {
    0.95
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub method: GenMethod,
    /// Defaults to every numeric column except the target.
    #[serde(default)]
    pub source_columns: Option<Vec<String>>,
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,
}

impl GenerationRequest {
    pub fn new(method: GenMethod) -> Self {
        Self {
            method,
            source_columns: None,
            target_column: None,
            variance_threshold: default_variance_threshold(),
            correlation_threshold: default_correlation_threshold(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Surviving columns, in generation order.
    pub columns: Vec<Column>,
    /// How many candidates were produced before pruning.
    pub candidates: usize,
    /// The `auto_gen` step that rebuilds exactly `columns`.
    pub step: Step,
}

impl GenerationOutcome {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

fn resolve_sources(table: &Table, req: &GenerationRequest) -> Result<Vec<String>, ExecError> {
    if let Some(target) = &req.target_column {
        if !table.has_column(target) {
            return Err(ExecError::Generation(format!(
                "target column '{target}' not found"
            )));
        }
    }
    match &req.source_columns {
        Some(cols) => {
            for col in cols {
                let column = table
                    .column(col)
                    .map_err(|e| ExecError::Generation(e.to_string()))?;
                if !column.data_type.is_numeric() {
                    return Err(ExecError::Generation(format!(
                        "source column '{col}' is {}, expected a numeric column",
                        column.data_type
                    )));
                }
            }
            Ok(cols
                .iter()
                .filter(|c| req.target_column.as_ref() != Some(*c))
                .cloned()
                .collect())
        }
        None => Ok(table
            .columns
            .iter()
            .filter(|c| c.data_type.is_numeric())
            .filter(|c| req.target_column.as_deref() != Some(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()),
    }
}

/// Mean-filled numeric view used for pruning decisions.
fn filled(column: &Column) -> Option<Vec<f64>> {
    let values = column.numeric_values().ok()?;
    let mean = stats::mean(&stats::present(&values))?;
    Some(values.into_iter().map(|v| v.unwrap_or(mean)).collect())
}

fn is_constant(xs: &[f64]) -> bool {
    xs.windows(2).all(|w| w[0] == w[1])
}

pub fn generate(
    table: &Table,
    req: &GenerationRequest,
    synthesizer: &dyn FeatureSynthesizer,
    max_columns: usize,
    control: &RunControl,
) -> Result<GenerationOutcome, ExecError> {
    if !(req.variance_threshold >= 0.0) {
        return Err(ExecError::Generation(
            "variance_threshold must be non-negative".into(),
        ));
    }
    if !(req.correlation_threshold > 0.0 && req.correlation_threshold <= 1.0) {
        return Err(ExecError::Generation(
            "correlation_threshold must be in (0, 1]".into(),
        ));
    }

    let sources = resolve_sources(table, req)?;
    let produced = generate_columns(table, req.method, &sources, None, max_columns, synthesizer)
        .map_err(|e| ExecError::Generation(e.to_string()))?;
    let candidates = produced.len();

    let mut kept: Vec<(Column, Vec<f64>)> = Vec::new();
    for (i, column) in produced.into_iter().enumerate() {
        if control.is_cancelled() {
            return Err(ExecError::Cancelled { step_index: 0 });
        }
        control.report(i, candidates);

        if column.data_type != DataType::Float && column.data_type != DataType::Int {
            continue;
        }
        let Some(xs) = filled(&column) else {
            continue;
        };
        if is_constant(&xs) {
            continue;
        }
        match stats::variance(&xs, 0) {
            Some(v) if v >= req.variance_threshold => {}
            _ => continue,
        }
        let redundant = kept.iter().any(|(_, ys)| {
            stats::pearson(&xs, ys)
                .map(|r| r.abs() > req.correlation_threshold)
                .unwrap_or(false)
        });
        if !redundant {
            kept.push((column, xs));
        }
    }
    control.report(candidates, candidates);

    let columns: Vec<Column> = kept.into_iter().map(|(c, _)| c).collect();
    let step = Step::AutoGen(AutoGenArgs {
        method: req.method,
        variance_threshold: req.variance_threshold,
        correlation_threshold: req.correlation_threshold,
        source_columns: sources,
        target_column: req.target_column.clone(),
        generated_columns: columns.iter().map(|c| c.name.clone()).collect(),
    });

    emit_span(
        "auto_generate",
        &[
            ("method", req.method.name().to_string()),
            ("candidates", candidates.to_string()),
            ("kept", columns.len().to_string()),
        ],
    );

    Ok(GenerationOutcome {
        columns,
        candidates,
        step,
    })
}
