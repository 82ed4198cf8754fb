#![forbid(unsafe_code)]
//! featcraft-planner: step lists in, checked plans out.
//!
//! - `dsl`: parse YAML/JSON step lists into `featcraft_ops::Step` values,
//!   reporting the offending step index for unknown ops or bad arguments.
//! - `validate`: plan every step against the schema visible at its position
//!   (forward references are rejected) without touching any data.
//! - `lineage`: which columns each step reads and writes, used to decide
//!   whether two steps are independent.

pub mod dsl;
pub mod lineage;
pub mod validate;

pub use dsl::yaml::{parse_steps, steps_to_yaml, DslError};
pub use lineage::{lineage, StepLineage};
pub use validate::{validate_steps, ValidatedPipeline, ValidationError};
