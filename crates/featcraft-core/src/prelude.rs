//! Convenient re-exports for downstream crates.

pub use crate::config::FeatureConfig;
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{FeatureSetId, JobId, SnapshotId};
pub use crate::manifest::{RunId, RunManifest};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::snapshot::DatasetSnapshot;
pub use crate::types::{Column, Scalar, Table};
