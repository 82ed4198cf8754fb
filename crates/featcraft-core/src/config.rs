//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Root directory (or key prefix) for materialization artifacts.
    pub store_root: String,

    /// Relevance analysis samples down to this many rows.
    pub analysis_sample_rows: usize,

    /// Seed for the deterministic analysis sample.
    pub analysis_seed: u64,

    /// |pearson| or |spearman| above this flags a likely leak.
    pub leak_threshold: f64,

    /// Equal-width bins used by the mutual-information estimator.
    pub mi_bins: usize,

    /// Rows returned by a preview when the caller gives no limit.
    pub preview_limit: usize,

    /// Upper bound on candidate columns a single auto-generation may emit.
    pub max_generated_columns: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            store_root: "/tmp/featcraft-store".to_string(),
            analysis_sample_rows: 10_000,
            analysis_seed: 42,
            leak_threshold: 0.99,
            mi_bins: 10,
            preview_limit: 20,
            max_generated_columns: 500,
        }
    }
}

impl FeatureConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `FEATCRAFT_STORE_ROOT`: artifact root
    /// - `FEATCRAFT_ANALYSIS_SAMPLE_ROWS`: analysis sample size
    /// - `FEATCRAFT_ANALYSIS_SEED`: analysis sample seed
    /// - `FEATCRAFT_LEAK_THRESHOLD`: leak flag threshold in (0, 1]
    /// - `FEATCRAFT_MI_BINS`: mutual-information bins (>= 2)
    /// - `FEATCRAFT_PREVIEW_LIMIT`: default preview rows
    /// - `FEATCRAFT_MAX_GENERATED_COLUMNS`: auto-generation cap
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("FEATCRAFT_STORE_ROOT") {
            if !s.trim().is_empty() {
                cfg.store_root = s;
            }
        }

        if let Ok(s) = std::env::var("FEATCRAFT_ANALYSIS_SAMPLE_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.analysis_sample_rows = v.max(1);
            }
        }

        if let Ok(s) = std::env::var("FEATCRAFT_ANALYSIS_SEED") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.analysis_seed = v;
            }
        }

        if let Ok(s) = std::env::var("FEATCRAFT_LEAK_THRESHOLD") {
            if let Ok(v) = s.parse::<f64>() {
                if v > 0.0 && v <= 1.0 {
                    cfg.leak_threshold = v;
                }
            }
        }

        if let Ok(s) = std::env::var("FEATCRAFT_MI_BINS") {
            if let Ok(v) = s.parse::<usize>() {
                if v >= 2 {
                    cfg.mi_bins = v;
                }
            }
        }

        if let Ok(s) = std::env::var("FEATCRAFT_PREVIEW_LIMIT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.preview_limit = v;
            }
        }

        if let Ok(s) = std::env::var("FEATCRAFT_MAX_GENERATED_COLUMNS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_generated_columns = v;
            }
        }

        cfg
    }
}
