#![forbid(unsafe_code)]
//! featcraft-exec: runs step lists, replays them for inference, and hosts
//! the two data-driven services built on top (auto-generation and
//! relevance analysis).
//!
//! Execution is strictly sequential: each step sees the table produced by
//! the previous one. A run either yields a complete `Materialization` or an
//! error naming the failing step; partial tables never escape.

pub mod autogen;
pub mod metrics;
pub mod relevance;
pub mod replay;
pub mod runtime;

pub use autogen::{generate, GenerationOutcome, GenerationRequest};
pub use relevance::{analyze, RelevanceRecord, TaskType};
pub use replay::{replay, InferencePlan};
pub use runtime::{ExecError, Executor, Materialization, RunControl};
