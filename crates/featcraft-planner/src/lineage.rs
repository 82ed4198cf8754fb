//! Column lineage: what each step reads and writes.

use std::collections::BTreeSet;

use featcraft_core::prelude::Schema;
use featcraft_ops::Step;
use serde::Serialize;

use crate::validate::{validate_steps, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepLineage {
    pub step_index: usize,
    pub op: &'static str,
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
    /// Prefixes of columns whose names are only known after execution.
    pub writes_prefixes: Vec<String>,
    pub removes_rows: bool,
}

impl StepLineage {
    fn writes_column(&self, col: &str) -> bool {
        self.writes.contains(col) || self.writes_prefixes.iter().any(|p| col.starts_with(p.as_str()))
    }

    /// Two steps are independent when neither reads or writes what the other
    /// writes and neither changes the row set. Swapping two independent
    /// adjacent steps leaves the final table unchanged up to column order.
    pub fn independent_of(&self, other: &StepLineage) -> bool {
        if self.removes_rows || other.removes_rows {
            return false;
        }
        let touches = |a: &StepLineage, b: &StepLineage| {
            a.reads.iter().chain(a.writes.iter()).any(|c| b.writes_column(c))
                || b.writes_prefixes
                    .iter()
                    .any(|p| a.writes_prefixes.iter().any(|q| p.starts_with(q.as_str()) || q.starts_with(p.as_str())))
        };
        !touches(self, other) && !touches(other, self)
    }
}

/// Validate `steps` and describe each step's reads and writes.
pub fn lineage(schema: &Schema, steps: &[Step]) -> Result<Vec<StepLineage>, ValidationError> {
    let validated = validate_steps(schema, steps)?;
    Ok(steps
        .iter()
        .zip(validated.plans)
        .enumerate()
        .map(|(step_index, (step, plan))| {
            let op = step.as_operator();
            StepLineage {
                step_index,
                op: op.name(),
                reads: op.inputs().into_iter().collect(),
                writes: plan.touched().cloned().collect(),
                writes_prefixes: plan.dynamic_prefixes,
                removes_rows: plan.removes_rows,
            }
        })
        .collect())
}

/// Index of the step that last wrote `col`, if any.
pub fn producer_of(lineage: &[StepLineage], col: &str) -> Option<usize> {
    lineage
        .iter()
        .rev()
        .find(|l| l.writes_column(col))
        .map(|l| l.step_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::yaml::parse_steps;
    use featcraft_core::prelude::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("a", DataType::Float),
            Field::new("b", DataType::Float),
            Field::new("city", DataType::Str),
        ])
    }

    #[test]
    fn disjoint_steps_are_independent() {
        let steps = parse_steps(
            r#"
- op: log
  col: a
- op: clip
  col: b
  lower: 0
- op: arithmetic
  col: a_log
  operator: add
  operand_type: scalar
  value: 1
"#,
        )
        .unwrap();
        let lin = lineage(&schema(), &steps).unwrap();
        assert!(lin[0].independent_of(&lin[1]));
        assert!(!lin[0].independent_of(&lin[2]));
        assert_eq!(producer_of(&lin, "a_log_arithmetic"), Some(2));
        assert_eq!(producer_of(&lin, "a"), None);
    }

    #[test]
    fn filters_and_onehot_prefixes_create_dependencies() {
        let steps = parse_steps(
            r#"
- op: onehot
  col: city
- op: log
  col: city_Paris
- op: filter
  conditions:
    - { col: a, op: gt, val: 0 }
- op: log
  col: b
"#,
        )
        .unwrap();
        let lin = lineage(&schema(), &steps).unwrap();
        assert!(!lin[0].independent_of(&lin[1]));
        assert!(!lin[2].independent_of(&lin[3]));
        assert_eq!(producer_of(&lin, "city_Paris"), Some(0));
    }
}
