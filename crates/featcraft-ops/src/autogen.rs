//! Candidate generation for auto-generated features and the `auto_gen`
//! provenance step that replays a generation run.
//!
//! Which candidates survive is decided by the generator in `featcraft-exec`;
//! the step only records the surviving names and rebuilds exactly those.

use featcraft_core::prelude::{Column, DataType, Schema, Table};
use serde::{Deserialize, Serialize};

use crate::math::{poly_terms, ArithOp, PolyTerm};
use crate::plan::OpPlan;
use crate::traits::{require_numeric, FeatureSynthesizer, OpError, Operator, StepContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenMethod {
    Arithmetic,
    Polynomial,
    FeatureSynthesis,
}

impl GenMethod {
    pub fn name(self) -> &'static str {
        match self {
            GenMethod::Arithmetic => "arithmetic",
            GenMethod::Polynomial => "polynomial",
            GenMethod::FeatureSynthesis => "feature_synthesis",
        }
    }
}

/// One column-producing formula over source columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Binary {
        left: String,
        right: String,
        op: ArithOp,
    },
    Poly(PolyTerm),
}

impl Candidate {
    pub fn name(&self) -> String {
        match self {
            Candidate::Binary { left, right, op } => format!("{left}_{}_{right}", op.word()),
            Candidate::Poly(term) => term.name(),
        }
    }

    pub fn compute(&self, table: &Table) -> Result<Column, OpError> {
        match self {
            Candidate::Binary { left, right, op } => {
                let a = table.column(left)?.numeric_values()?;
                let b = table.column(right)?.numeric_values()?;
                let values = a
                    .iter()
                    .zip(&b)
                    .map(|(x, y)| op.eval((*x)?, (*y)?))
                    .collect();
                Ok(Column::from_f64s(self.name(), values))
            }
            Candidate::Poly(term) => term.compute(table),
        }
    }
}

/// Candidates for the formula-based methods, in generation order.
///
/// Arithmetic walks every pair (i < j) and emits add, sub, mul, div;
/// polynomial emits each square followed by products with later columns.
pub fn candidates(method: GenMethod, sources: &[String]) -> Vec<Candidate> {
    match method {
        GenMethod::Arithmetic => {
            let mut out = Vec::new();
            for (i, left) in sources.iter().enumerate() {
                for right in &sources[i + 1..] {
                    for op in [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div] {
                        out.push(Candidate::Binary {
                            left: left.clone(),
                            right: right.clone(),
                            op,
                        });
                    }
                }
            }
            out
        }
        GenMethod::Polynomial => poly_terms(sources).into_iter().map(Candidate::Poly).collect(),
        GenMethod::FeatureSynthesis => Vec::new(),
    }
}

/// Build generated columns. With `only`, exactly those names are produced
/// (in that order); otherwise every candidate whose name is not already a
/// table column, capped at `limit`.
pub fn generate_columns(
    table: &Table,
    method: GenMethod,
    sources: &[String],
    only: Option<&[String]>,
    limit: usize,
    synthesizer: &dyn FeatureSynthesizer,
) -> Result<Vec<Column>, OpError> {
    let mut produced: Vec<Column> = match method {
        GenMethod::FeatureSynthesis => {
            let extended = synthesizer.synthesize(table, sources)?;
            extended
                .columns
                .into_iter()
                .filter(|c| !table.has_column(&c.name))
                .collect()
        }
        _ => {
            let mut cols = Vec::new();
            for candidate in candidates(method, sources) {
                let name = candidate.name();
                let wanted = match only {
                    Some(names) => names.contains(&name),
                    None => !table.has_column(&name),
                };
                if wanted {
                    cols.push(candidate.compute(table)?);
                }
            }
            cols
        }
    };

    match only {
        Some(names) => names
            .iter()
            .map(|name| {
                let idx = produced
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| {
                        OpError::Exec(format!("generated column '{name}' could not be rebuilt"))
                    })?;
                Ok(produced.swap_remove(idx))
            })
            .collect(),
        None => {
            produced.truncate(limit);
            Ok(produced)
        }
    }
}

/// Default synthesizer: single-column transform primitives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveSynthesizer;

impl FeatureSynthesizer for PrimitiveSynthesizer {
    fn name(&self) -> &'static str {
        "primitives"
    }

    fn synthesize(&self, table: &Table, source_columns: &[String]) -> Result<Table, OpError> {
        let mut out = table.clone();
        for col in source_columns {
            let values = table.column(col)?.numeric_values()?;
            let primitives: [(&str, fn(f64) -> f64); 3] = [
                ("NATURAL_LOGARITHM", f64::ln),
                ("SINE", f64::sin),
                ("COSINE", f64::cos),
            ];
            for (name, f) in primitives {
                let derived = values.iter().map(|v| v.map(f)).collect();
                out.set_column(Column::from_f64s(format!("{name}({col})"), derived))?;
            }
        }
        Ok(out)
    }
}

fn default_variance_threshold() -> f64 {
    0.0
}

fn default_correlation_threshold() -> f64 {
    0.95
}

/// Provenance of one auto-generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoGenArgs {
    pub method: GenMethod,
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,
    pub source_columns: Vec<String>,
    #[serde(default)]
    pub target_column: Option<String>,
    /// Columns that survived pruning, in generation order.
    #[serde(default)]
    pub generated_columns: Vec<String>,
}

impl Operator for AutoGenArgs {
    fn name(&self) -> &'static str {
        "auto_gen"
    }

    fn inputs(&self) -> Vec<String> {
        self.source_columns.clone()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        for col in &self.source_columns {
            require_numeric(input, col, self.name())?;
        }
        let mut plan = OpPlan::new(input.clone());
        for name in &self.generated_columns {
            let step = OpPlan::with_output(&plan.output_schema, name, DataType::Float);
            plan.output_schema = step.output_schema;
            plan.created.extend(step.created);
            plan.mutated.extend(step.mutated);
        }
        Ok(plan)
    }

    fn apply(&self, mut table: Table, ctx: &mut StepContext<'_>) -> Result<Table, OpError> {
        let columns = generate_columns(
            &table,
            self.method,
            &self.source_columns,
            Some(&self.generated_columns),
            usize::MAX,
            ctx.synthesizer,
        )?;
        for column in columns {
            table.set_column(column)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featcraft_core::prelude::Scalar;

    fn table() -> Table {
        Table::new(vec![
            Column::new("a", DataType::Int, vec![Scalar::Int(1), Scalar::Int(4)]),
            Column::new("b", DataType::Int, vec![Scalar::Int(0), Scalar::Int(2)]),
            Column::new("c", DataType::Float, vec![Scalar::Float(1.0), Scalar::Float(1.0)]),
        ])
        .unwrap()
    }

    fn names(cols: &[Column]) -> Vec<&str> {
        cols.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn arithmetic_candidates_in_pair_order() {
        let sources = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let all: Vec<String> = candidates(GenMethod::Arithmetic, &sources)
            .iter()
            .map(Candidate::name)
            .collect();
        assert_eq!(all.len(), 12);
        assert_eq!(&all[..4], &["a_plus_b", "a_minus_b", "a_times_b", "a_div_b"]);
        assert_eq!(all[11], "b_div_c");
    }

    #[test]
    fn replay_rebuilds_only_recorded_columns() {
        let args = AutoGenArgs {
            method: GenMethod::Arithmetic,
            variance_threshold: 0.0,
            correlation_threshold: 0.95,
            source_columns: vec!["a".into(), "b".into()],
            target_column: None,
            generated_columns: vec!["a_div_b".into(), "a_plus_b".into()],
        };
        let synth = PrimitiveSynthesizer;
        let mut ctx = StepContext::fit(&synth);
        let out = args.apply(table(), &mut ctx).unwrap();
        assert_eq!(out.column_names(), vec!["a", "b", "c", "a_div_b", "a_plus_b"]);
        assert_eq!(
            out.column("a_div_b").unwrap().values,
            vec![Scalar::Null, Scalar::Float(2.0)]
        );

        let unknown = AutoGenArgs {
            generated_columns: vec!["a_pow_b".into()],
            ..args
        };
        let mut ctx = StepContext::fit(&synth);
        assert!(unknown.apply(table(), &mut ctx).is_err());
    }

    #[test]
    fn synthesis_uses_primitive_names() {
        let cols = generate_columns(
            &table(),
            GenMethod::FeatureSynthesis,
            &["b".to_string()],
            None,
            10,
            &PrimitiveSynthesizer,
        )
        .unwrap();
        assert_eq!(
            names(&cols),
            vec!["NATURAL_LOGARITHM(b)", "SINE(b)", "COSINE(b)"]
        );
        // ln(0) is -inf, which is missing
        assert_eq!(cols[0].values[0], Scalar::Null);
    }

    #[test]
    fn generation_skips_existing_names_and_caps() {
        let mut t = table();
        t.set_column(Column::from_f64s("a_squared", vec![None, None]))
            .unwrap();
        let cols = generate_columns(
            &t,
            GenMethod::Polynomial,
            &["a".to_string(), "b".to_string()],
            None,
            2,
            &PrimitiveSynthesizer,
        )
        .unwrap();
        assert_eq!(names(&cols), vec!["a_times_b", "b_squared"]);
    }
}
