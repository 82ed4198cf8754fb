//! Group partitioning shared by the time-series and group-by ops.
//!
//! Rows are stable-sorted by (group keys..., order key) and split into runs
//! of equal group keys. Group keys compare on their raw values so that text
//! keys like "7" and "007" stay distinct; only the order key is compared in
//! its parsed (numeric or date) form.

use std::cmp::Ordering;

use featcraft_core::prelude::{Scalar, Table};
use featcraft_core::types::{scalar_cmp, scalar_eq, scalar_tuple_cmp};
use serde::{Deserialize, Serialize};

use crate::traits::OpError;

/// A single grouping column or a composite key (AND-matched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnList {
    One(String),
    Many(Vec<String>),
}

impl ColumnList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ColumnList::One(c) => vec![c.clone()],
            ColumnList::Many(cs) => cs.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ColumnList::One(c) => c.is_empty(),
            ColumnList::Many(cs) => cs.is_empty(),
        }
    }
}

impl From<&str> for ColumnList {
    fn from(s: &str) -> Self {
        ColumnList::One(s.to_string())
    }
}

/// Split rows into groups, each listed in (order key, original index) order.
///
/// Rows with a missing value in any group key belong to no group and are
/// left out; callers emit missing results for them.
pub fn grouped_rows(
    table: &Table,
    group_cols: &[String],
    order_col: Option<&str>,
) -> Result<Vec<Vec<usize>>, OpError> {
    let key_cols = group_cols
        .iter()
        .map(|c| table.column(c))
        .collect::<Result<Vec<_>, _>>()?;
    let order_values: Option<Vec<Scalar>> = match order_col {
        Some(c) => Some(table.column(c)?.values.iter().map(Scalar::sortable).collect()),
        None => None,
    };

    let mut rows: Vec<usize> = (0..table.num_rows())
        .filter(|&row| key_cols.iter().all(|c| !c.values[row].is_null()))
        .collect();
    let key_of = |row: usize| -> Vec<Scalar> {
        key_cols.iter().map(|c| c.values[row].clone()).collect()
    };
    let keys: Vec<Vec<Scalar>> = (0..table.num_rows()).map(key_of).collect();
    rows.sort_by(|&a, &b| {
        scalar_tuple_cmp(&keys[a], &keys[b]).then_with(|| match &order_values {
            Some(order) => scalar_cmp(&order[a], &order[b]),
            None => Ordering::Equal,
        })
    });

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Option<usize> = None;
    for row in rows {
        let same = current.is_some_and(|prev| {
            keys[prev].iter().zip(&keys[row]).all(|(a, b)| scalar_eq(a, b))
        });
        match groups.last_mut() {
            Some(last) if same => last.push(row),
            _ => groups.push(vec![row]),
        }
        current = Some(row);
    }
    Ok(groups)
}
