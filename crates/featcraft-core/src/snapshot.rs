//! Immutable dataset snapshots: the raw input every materialization starts from.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::SnapshotId;
use crate::schema::Schema;
use crate::types::Table;

/// A read-only table plus its schema map. Core never mutates a snapshot;
/// executors clone the table before applying steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub id: SnapshotId,
    pub name: String,
    table: Table,
    schema: Schema,
}

impl DatasetSnapshot {
    pub fn new(id: SnapshotId, name: impl Into<String>, table: Table) -> Self {
        let schema = table.schema();
        Self {
            id,
            name: name.into(),
            table,
            schema,
        }
    }

    /// Build a snapshot whose column types must agree with an external schema map.
    pub fn with_schema(
        id: SnapshotId,
        name: impl Into<String>,
        table: Table,
        schema: Schema,
    ) -> Result<Self> {
        if table.schema() != schema {
            return Err(Error::Schema(format!(
                "snapshot table does not match schema ({} vs {} columns)",
                table.num_columns(),
                schema.fields.len()
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            table,
            schema,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}
