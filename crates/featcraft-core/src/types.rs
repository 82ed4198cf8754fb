//! Row/column values and the in-memory `Table` every op reads and writes.
//!
//! Missing data is always `Scalar::Null`; non-finite floats are normalized to
//! `Null` on construction so tables stay serializable and hash-stable.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Field, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Milliseconds since Unix epoch (UTC).
    DateTime(i64),
}

impl Scalar {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Bool),
            Scalar::Int(_) => Some(DataType::Int),
            Scalar::Float(_) => Some(DataType::Float),
            Scalar::Str(_) => Some(DataType::Str),
            Scalar::DateTime(_) => Some(DataType::DateTime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Finite floats become `Float`; NaN and infinities become `Null`.
    pub fn from_f64(v: f64) -> Self {
        if v.is_finite() {
            Scalar::Float(v)
        } else {
            Scalar::Null
        }
    }

    pub fn from_opt_f64(v: Option<f64>) -> Self {
        v.map(Scalar::from_f64).unwrap_or(Scalar::Null)
    }

    /// Numeric view used by arithmetic and statistics. Strings have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Null | Scalar::Str(_) => None,
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f).filter(|f| f.is_finite()),
            Scalar::DateTime(ms) => Some(*ms as f64),
        }
    }

    /// Parse a raw text cell into the given logical type.
    ///
    /// Returns `None` when the text cannot represent that type. Empty text
    /// (after trimming) is `Null` for every type but `Str`.
    pub fn coerce_str(raw: &str, data_type: DataType) -> Option<Scalar> {
        let trimmed = raw.trim();
        if trimmed.is_empty() && data_type != DataType::Str {
            return Some(Scalar::Null);
        }
        match data_type {
            DataType::Str => Some(Scalar::Str(raw.to_string())),
            DataType::Int => trimmed
                .parse::<i64>()
                .ok()
                .map(Scalar::Int)
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0 && f.is_finite())
                        .map(|f| Scalar::Int(f as i64))
                }),
            DataType::Float => trimmed.parse::<f64>().ok().map(Scalar::from_f64),
            DataType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Scalar::Bool(true)),
                "false" | "0" | "no" => Some(Scalar::Bool(false)),
                _ => None,
            },
            DataType::DateTime => parse_datetime_ms(trimmed).map(Scalar::DateTime),
        }
    }

    /// Convert this value into `data_type`, going through text when needed.
    pub fn cast(&self, data_type: DataType) -> Option<Scalar> {
        match (self, data_type) {
            (Scalar::Null, _) => Some(Scalar::Null),
            (Scalar::Int(i), DataType::Float) => Some(Scalar::Float(*i as f64)),
            (Scalar::Float(f), DataType::Int) if f.fract() == 0.0 => Some(Scalar::Int(*f as i64)),
            (Scalar::Bool(b), DataType::Int) => Some(Scalar::Int(*b as i64)),
            (Scalar::Bool(b), DataType::Float) => Some(Scalar::Float(*b as i64 as f64)),
            (v, dt) if v.data_type() == Some(dt) => Some(v.clone()),
            (v, DataType::Str) => Some(Scalar::Str(v.to_string())),
            (v, dt) => Scalar::coerce_str(&v.to_string(), dt),
        }
    }

    /// Make string cells orderable the way sort keys expect: numeric text
    /// sorts numerically, date text sorts chronologically.
    pub fn sortable(&self) -> Scalar {
        match self {
            Scalar::Str(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f64>() {
                    return Scalar::from_f64(f);
                }
                match parse_datetime_ms(t) {
                    Some(ms) => Scalar::DateTime(ms),
                    None => self.clone(),
                }
            }
            other => other.clone(),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(s) => f.write_str(s),
            Scalar::DateTime(ms) => match DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{ms}"),
            },
        }
    }
}

/// Parse the date/time layouts snapshots commonly carry into epoch millis.
pub fn parse_datetime_ms(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Compare two scalars for sorting.
///
/// Nulls are sorted first; numeric variants compare by value across types.
pub fn scalar_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (Int(x), Int(y)) => x.cmp(y),
        (DateTime(x), DateTime(y)) => x.cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Int(_) | Float(_), Int(_) | Float(_)) => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        // Mixed types: order by variant order
        _ => scalar_type_order(a).cmp(&scalar_type_order(b)),
    }
}

/// Compare two scalar tuples lexicographically for sorting.
pub fn scalar_tuple_cmp(a: &[Scalar], b: &[Scalar]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match scalar_cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Equality used by filters and group keys: numeric values compare by value.
pub fn scalar_eq(a: &Scalar, b: &Scalar) -> bool {
    scalar_cmp(a, b) == Ordering::Equal
}

fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        Int(_) | Float(_) => 2,
        DateTime(_) => 3,
        Str(_) => 4,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Float column from optional numbers; non-finite entries become `Null`.
    pub fn from_f64s(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(
            name,
            DataType::Float,
            values.into_iter().map(Scalar::from_opt_f64).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Numeric view of the column. Bool counts as 0/1.
    pub fn numeric_values(&self) -> Result<Vec<Option<f64>>> {
        match self.data_type {
            DataType::Int | DataType::Float | DataType::Bool => {
                Ok(self.values.iter().map(Scalar::as_f64).collect())
            }
            other => Err(Error::TypeMismatch {
                column: self.name.clone(),
                expected: "numeric",
                found: other.to_string(),
            }),
        }
    }

    pub fn field(&self) -> Field {
        Field::new(self.name.clone(), self.data_type)
    }
}

/// Column-major table; all columns share the same row count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
}

impl Table {
    /// Build a table, rejecting ragged columns and duplicate names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            for col in &columns {
                if col.len() != rows {
                    return Err(Error::Schema(format!(
                        "column '{}' has {} rows, expected {}",
                        col.name,
                        col.len(),
                        rows
                    )));
                }
            }
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(Error::Schema(format!("duplicate column '{}'", col.name)));
            }
        }
        Ok(Self { columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.columns.iter().map(Column::field).collect())
    }

    /// Assign a column: replaces one with the same name in place, otherwise
    /// appends. The row count must match unless the table has no columns.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(Error::Schema(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.num_rows()
            )));
        }
        match self.index_of(&column.name) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        Ok(self.columns.remove(idx))
    }

    /// New table with the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data_type: c.data_type,
                    values: rows.iter().map(|&r| c.values[r].clone()).collect(),
                })
                .collect(),
        }
    }

    /// First `n` rows (all rows when `n` exceeds the row count).
    pub fn head(&self, n: usize) -> Table {
        let n = n.min(self.num_rows());
        let rows: Vec<usize> = (0..n).collect();
        self.take(&rows)
    }

    /// Project to the named columns, in the requested order.
    pub fn select(&self, names: &[String]) -> Result<Table> {
        let columns = names
            .iter()
            .map(|n| self.column(n).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Table { columns })
    }

    pub fn row(&self, idx: usize) -> Vec<Scalar> {
        self.columns.iter().map(|c| c.values[idx].clone()).collect()
    }

    /// Row order after a stable sort on `keys` (nulls first).
    ///
    /// Builds (sort_key_tuple, original_index) pairs and sorts them; ties keep
    /// their original relative order.
    pub fn sorted_indices(&self, keys: &[String]) -> Result<Vec<usize>> {
        let key_cols: Vec<&Column> = keys
            .iter()
            .map(|k| self.column(k))
            .collect::<Result<Vec<_>>>()?;

        let mut tuples: Vec<(Vec<Scalar>, usize)> = (0..self.num_rows())
            .map(|row_idx| {
                let key = key_cols
                    .iter()
                    .map(|c| c.values[row_idx].sortable())
                    .collect();
                (key, row_idx)
            })
            .collect();
        tuples.sort_by(|(a, _), (b, _)| scalar_tuple_cmp(a, b));
        Ok(tuples.into_iter().map(|(_, idx)| idx).collect())
    }
}
