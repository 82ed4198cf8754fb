//! Operator planning surface: what a step does to the schema.

use featcraft_core::prelude::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

/// Result of planning one step against the schema visible at its position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpPlan {
    pub output_schema: Schema,

    /// Columns this step adds (or overwrites) in its output.
    pub created: Vec<String>,

    /// Existing columns rewritten in place.
    pub mutated: Vec<String>,

    /// Columns removed from the table.
    pub dropped: Vec<String>,

    /// The step may remove rows (affects every column downstream).
    pub removes_rows: bool,

    /// Output columns whose names depend on the data, by name prefix
    /// (e.g. one-hot indicators). Validation defers checks for these.
    pub dynamic_prefixes: Vec<String>,
}

impl OpPlan {
    pub fn new(output_schema: Schema) -> Self {
        Self {
            output_schema,
            ..Default::default()
        }
    }

    /// Plan for a step that writes `name` with type `data_type` on top of `input`.
    pub fn with_output(input: &Schema, name: &str, data_type: DataType) -> Self {
        let mut schema = input.clone();
        let existed = schema.contains(name);
        schema.upsert(Field::new(name, data_type));
        let mut plan = Self::new(schema);
        if existed {
            plan.mutated.push(name.to_string());
        } else {
            plan.created.push(name.to_string());
        }
        plan
    }

    /// Every column this step writes or removes.
    pub fn touched(&self) -> impl Iterator<Item = &String> {
        self.created
            .iter()
            .chain(self.mutated.iter())
            .chain(self.dropped.iter())
    }
}
