//! Parameters learned while fitting a step list, kept for inference replay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::traits::OpError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fitted {
    Standard { mean: Option<f64>, std: Option<f64> },
    MinMax { min: Option<f64>, max: Option<f64> },
    Categories { categories: Vec<String> },
    TargetMeans { means: BTreeMap<String, f64> },
}

impl Fitted {
    pub fn kind(&self) -> &'static str {
        match self {
            Fitted::Standard { .. } => "standard",
            Fitted::MinMax { .. } => "min_max",
            Fitted::Categories { .. } => "categories",
            Fitted::TargetMeans { .. } => "target_means",
        }
    }

    pub(crate) fn mismatch(&self, expected: &str) -> OpError {
        OpError::Exec(format!(
            "fitted state is '{}', step expects '{expected}'",
            self.kind()
        ))
    }
}

/// Fitted parameters keyed by step index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub steps: BTreeMap<usize, Fitted>,
}

impl FittedState {
    pub fn get(&self, step_index: usize) -> Option<&Fitted> {
        self.steps.get(&step_index)
    }

    pub fn insert(&mut self, step_index: usize, fitted: Fitted) {
        self.steps.insert(step_index, fitted);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
