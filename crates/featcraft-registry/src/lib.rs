#![forbid(unsafe_code)]
//! featcraft-registry: versioned feature sets over immutable snapshots.
//!
//! A feature set binds a snapshot to a step list and owns the last
//! successfully computed materialization of that list. Lifecycle:
//!
//! ```text
//! Draft --materialize ok--> Materialized --steps staged--> Stale
//!                               ^                            |
//!                               +-------materialize ok-------+
//! ```
//!
//! Writers on one feature set are serialized by a per-set lock; readers
//! always see a fully committed materialization (the new one is built and
//! persisted first, then swapped in).

pub mod catalog;
pub mod error;
pub mod feature_set;
pub mod jobs;
pub mod registry;

pub use catalog::{InMemoryCatalog, SnapshotCatalog};
pub use error::{RegistryError, Result};
pub use feature_set::{FeatureSet, FeatureSetState, MaterializationRef};
pub use jobs::{JobHandle, JobRunner, JobStatus};
pub use registry::{AutoGenerateRequest, FeatureSetRegistry, FeatureSetUpdate, TrainingView};
