//! Feature set metadata and lifecycle states.

use std::collections::BTreeSet;
use std::fmt;

use featcraft_core::prelude::{FeatureSetId, Hash256, SnapshotId};
use featcraft_ops::Step;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSetState {
    Draft,
    Materialized,
    Stale,
    Deleted,
}

impl FeatureSetState {
    pub fn name(self) -> &'static str {
        match self {
            FeatureSetState::Draft => "draft",
            FeatureSetState::Materialized => "materialized",
            FeatureSetState::Stale => "stale",
            FeatureSetState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for FeatureSetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the committed materialization artifact lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializationRef {
    pub path: String,
    pub generation: u64,
    pub digest: Hash256,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub id: FeatureSetId,
    pub name: String,
    pub snapshot_id: SnapshotId,
    pub version_tag: String,
    pub steps: Vec<Step>,
    pub active_features: BTreeSet<String>,
    pub target_column: Option<String>,
    pub state: FeatureSetState,
    pub materialization: Option<MaterializationRef>,
    /// Milliseconds since Unix epoch (UTC).
    pub created_ms: i64,
    pub updated_ms: i64,
}

impl FeatureSet {
    pub fn columns(&self) -> &[String] {
        self.materialization
            .as_ref()
            .map(|m| m.columns.as_slice())
            .unwrap_or(&[])
    }
}
