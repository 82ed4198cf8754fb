#![forbid(unsafe_code)]
//! featcraft: versioned, reproducible feature pipelines over tabular snapshots.
//!
//! This facade re-exports the workspace crates:
//! - [`featcraft_core`]: tables, schemas, ids, config, hashing and stats
//! - [`featcraft_ops`]: the step catalog and the formula engine
//! - [`featcraft_planner`]: step-list parsing, validation and lineage
//! - [`featcraft_exec`]: execution, replay, auto-generation and relevance analysis
//! - [`featcraft_store`]: artifact storage and CSV IO
//! - [`featcraft_registry`]: feature sets, lifecycle and background jobs

pub use featcraft_core;
pub use featcraft_exec;
pub use featcraft_ops;
pub use featcraft_planner;
pub use featcraft_registry;
pub use featcraft_store;
