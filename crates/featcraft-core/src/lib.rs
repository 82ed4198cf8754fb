#![forbid(unsafe_code)]
//! featcraft-core: shared data model for the feature pipeline engine.
//!
//! - `types`: `Scalar`, `Column` and the in-memory `Table`
//! - `schema`: logical column types and `Schema`
//! - `snapshot`: immutable `DatasetSnapshot` inputs
//! - `stats`: numeric helpers shared by ops, auto-generation and analysis
//! - `hash`/`manifest`: stable digests and run provenance
//!
//! No I/O and no async here; higher crates layer on top.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod schema;
pub mod snapshot;
pub mod stats;
pub mod types;

pub use error::{Error, Result};

/// Engine version recorded in run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
