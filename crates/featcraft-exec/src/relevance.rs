//! Relevance scoring of candidate features against a target column.
//!
//! Read-only: the analyzed table is never modified and nothing is persisted.
//! Each candidate gets Pearson and Spearman correlations (over rows where
//! both sides are present) and a binned mutual-information estimate in nats.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use featcraft_core::prelude::{Column, DataType, FeatureConfig, Scalar, Table};
use featcraft_core::stats;

use crate::metrics::emit_span;
use crate::runtime::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Regression,
    Classification,
}

impl TaskType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regression" => Some(TaskType::Regression),
            "classification" => Some(TaskType::Classification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceRecord {
    pub feature: String,
    pub mutual_info: f64,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    pub is_leak: bool,
}

/// Numeric view of a column. Text is label-encoded over its sorted distinct
/// values so categorical candidates can be scored too.
fn encode(column: &Column, rows: &[usize]) -> Vec<Option<f64>> {
    match column.data_type {
        DataType::Str => {
            let labels: BTreeSet<&str> = rows
                .iter()
                .filter_map(|&r| match &column.values[r] {
                    Scalar::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            let codes: HashMap<&str, f64> = labels
                .into_iter()
                .enumerate()
                .map(|(i, l)| (l, i as f64))
                .collect();
            rows.iter()
                .map(|&r| match &column.values[r] {
                    Scalar::Str(s) => codes.get(s.as_str()).copied(),
                    _ => None,
                })
                .collect()
        }
        _ => rows.iter().map(|&r| column.values[r].as_f64()).collect(),
    }
}

/// Equal-width bin index per value.
fn bin(xs: &[f64], bins: usize) -> Vec<usize> {
    let (lo, hi) = match (stats::min(xs), stats::max(xs)) {
        (Some(lo), Some(hi)) if hi > lo => (lo, hi),
        _ => return vec![0; xs.len()],
    };
    let width = (hi - lo) / bins as f64;
    xs.iter()
        .map(|x| (((x - lo) / width) as usize).min(bins - 1))
        .collect()
}

/// Discrete labels: distinct values in sorted order.
fn labels(xs: &[f64]) -> Vec<usize> {
    let mut distinct: Vec<f64> = xs.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    xs.iter()
        .map(|x| distinct.partition_point(|d| d.total_cmp(x).is_lt()))
        .collect()
}

/// Mutual information of two discrete variables, in nats.
fn mutual_information(xs: &[usize], ys: &[usize]) -> f64 {
    let n = xs.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mut joint: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut px: BTreeMap<usize, f64> = BTreeMap::new();
    let mut py: BTreeMap<usize, f64> = BTreeMap::new();
    for (&x, &y) in xs.iter().zip(ys) {
        *joint.entry((x, y)).or_default() += 1.0;
        *px.entry(x).or_default() += 1.0;
        *py.entry(y).or_default() += 1.0;
    }
    let mi: f64 = joint
        .iter()
        .map(|(&(x, y), &c)| {
            let pxy = c / n;
            pxy * (pxy / ((px[&x] / n) * (py[&y] / n))).ln()
        })
        .sum();
    mi.max(0.0)
}

/// Rows with a present target, sampled down to `cfg.analysis_sample_rows`.
fn analysis_rows(target: &Column, cfg: &FeatureConfig) -> Vec<usize> {
    let present: Vec<usize> = (0..target.len())
        .filter(|&r| !target.values[r].is_null())
        .collect();
    if present.len() <= cfg.analysis_sample_rows {
        return present;
    }
    let mut rng = StdRng::seed_from_u64(cfg.analysis_seed);
    let mut picked: Vec<usize> =
        rand::seq::index::sample(&mut rng, present.len(), cfg.analysis_sample_rows)
            .into_iter()
            .map(|i| present[i])
            .collect();
    picked.sort_unstable();
    picked
}

/// Score `features` (all non-target columns when empty) against `target`.
///
/// Records come back sorted by mutual information, highest first, ties
/// broken by feature name. Constant or entirely missing candidates are
/// skipped.
pub fn analyze(
    table: &Table,
    target: &str,
    features: &[String],
    task: TaskType,
    cfg: &FeatureConfig,
) -> Result<Vec<RelevanceRecord>, ExecError> {
    if cfg.mi_bins < 2 {
        return Err(ExecError::Analysis(format!(
            "mutual information needs at least 2 bins, got {}",
            cfg.mi_bins
        )));
    }
    let target_col = table
        .column(target)
        .map_err(|_| ExecError::Analysis(format!("target column '{target}' not found")))?;
    let candidates: Vec<String> = if features.is_empty() {
        table.column_names()
    } else {
        features.to_vec()
    };
    let missing: Vec<&String> = candidates.iter().filter(|c| !table.has_column(c)).collect();
    if !missing.is_empty() {
        return Err(ExecError::Analysis(format!("columns not found: {missing:?}")));
    }

    let rows = analysis_rows(target_col, cfg);
    let y: Vec<f64> = encode(target_col, &rows).into_iter().flatten().collect();
    if task == TaskType::Regression && target_col.data_type == DataType::Str {
        return Err(ExecError::Analysis(format!(
            "regression target '{target}' must be numeric"
        )));
    }
    let y_discrete = match task {
        TaskType::Regression => bin(&y, cfg.mi_bins),
        TaskType::Classification => labels(&y),
    };

    let mut records = Vec::new();
    for name in candidates.iter().filter(|c| c.as_str() != target) {
        let column = table
            .column(name)
            .map_err(|e| ExecError::Analysis(e.to_string()))?;
        let xs = encode(column, &rows);
        let present = stats::present(&xs);
        let Some(median) = stats::median(&present) else {
            continue;
        };
        if present.windows(2).all(|w| w[0] == w[1]) {
            continue;
        }

        let (px, py) = stats::paired(&xs, &y.iter().copied().map(Some).collect::<Vec<_>>());
        let pearson = stats::pearson(&px, &py);
        let spearman = stats::spearman(&px, &py);

        let imputed: Vec<f64> = xs.iter().map(|x| x.unwrap_or(median)).collect();
        let x_discrete = if column.data_type == DataType::Str {
            labels(&imputed)
        } else {
            bin(&imputed, cfg.mi_bins)
        };
        let mutual_info = mutual_information(&x_discrete, &y_discrete);

        let over = |r: Option<f64>| r.map(|r| r.abs() > cfg.leak_threshold).unwrap_or(false);
        records.push(RelevanceRecord {
            feature: name.clone(),
            mutual_info,
            pearson,
            spearman,
            is_leak: over(pearson) || over(spearman),
        });
    }

    records.sort_by(|a, b| {
        b.mutual_info
            .total_cmp(&a.mutual_info)
            .then_with(|| a.feature.cmp(&b.feature))
    });

    let leaks = records.iter().filter(|r| r.is_leak).count();
    if leaks > 0 {
        tracing::warn!(target_column = target, leaks, "features flagged as likely leaks");
    }
    emit_span(
        "analyze",
        &[
            ("target", target.to_string()),
            ("rows", rows.len().to_string()),
            ("features", records.len().to_string()),
        ],
    );
    Ok(records)
}
