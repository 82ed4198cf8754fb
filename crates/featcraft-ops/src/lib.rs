#![forbid(unsafe_code)]
//! featcraft-ops: the op catalog.
//!
//! Every transformation kind is one variant of the closed [`Step`] enum and
//! carries its own typed argument struct. Argument structs implement
//! [`Operator`]:
//! - `plan(&Schema)` checks references/types against the columns available at
//!   that point and reports the output schema (static validation);
//! - `apply(Table, &mut StepContext)` performs the transformation.
//!
//! Ops that learn parameters from data (scalers, encoders) record them in the
//! context so the same step list can be replayed on unseen rows.

pub mod plan;
pub mod traits;

pub mod autogen;
pub mod encode;
pub mod filter;
pub mod fitted;
pub mod formula;
pub mod groupby;
pub mod literal;
pub mod math;
pub mod partition;
pub mod project;
pub mod scale;
pub mod step;
pub mod time_series;

pub use fitted::{Fitted, FittedState};
pub use plan::OpPlan;
pub use step::Step;
pub use autogen::PrimitiveSynthesizer;
pub use traits::{FeatureSynthesizer, OpError, Operator, StepContext};
