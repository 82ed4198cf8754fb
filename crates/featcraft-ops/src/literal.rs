//! Untyped literals from step arguments, coerced against column types.

use featcraft_core::prelude::{DataType, Scalar};
use serde::{Deserialize, Serialize};

use crate::traits::OpError;

/// A literal as written in a step list: `18`, `"18"`, `true`, `["US", "CA"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Literal>),
}

impl Literal {
    /// Coerce to a scalar of `data_type`, the way a comparison against that
    /// column must see it.
    pub fn coerce(&self, data_type: DataType, column: &str) -> Result<Scalar, OpError> {
        let coerced = match self {
            Literal::Bool(b) => Scalar::Bool(*b).cast(data_type),
            Literal::Number(n) => match data_type {
                DataType::Int if n.fract() == 0.0 => Some(Scalar::Int(*n as i64)),
                DataType::Int | DataType::Float => Some(Scalar::from_f64(*n)),
                DataType::Str => Some(Scalar::Str(Scalar::Float(*n).to_string())),
                DataType::Bool => match *n {
                    v if v == 0.0 => Some(Scalar::Bool(false)),
                    v if v == 1.0 => Some(Scalar::Bool(true)),
                    _ => None,
                },
                DataType::DateTime => Some(Scalar::DateTime(*n as i64)),
            },
            Literal::Text(s) => match data_type {
                // A fractional text value compared against an int column keeps its precision.
                DataType::Int => Scalar::coerce_str(s, DataType::Int)
                    .or_else(|| Scalar::coerce_str(s, DataType::Float)),
                other => Scalar::coerce_str(s, other),
            },
            Literal::List(_) => None,
        };
        coerced.ok_or_else(|| {
            OpError::InvalidArgs(format!(
                "cannot coerce {} to {data_type} for column '{column}'",
                self.describe()
            ))
        })
    }

    /// Items of a set-membership literal: a list, or a comma-separated string.
    pub fn items(&self) -> Vec<Literal> {
        match self {
            Literal::List(items) => items.clone(),
            Literal::Text(s) => s
                .split(',')
                .map(|part| Literal::Text(part.trim().to_string()))
                .collect(),
            other => vec![other.clone()],
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            Literal::Text(s) => s.trim().parse().ok(),
            Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Literal::List(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Literal::Bool(b) => b.to_string(),
            Literal::Number(n) => n.to_string(),
            Literal::Text(s) => format!("'{s}'"),
            Literal::List(items) => format!("list of {}", items.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_numbers_coerce_per_column_type() {
        let lit = Literal::Text("18".into());
        assert_eq!(lit.coerce(DataType::Int, "age").unwrap(), Scalar::Int(18));
        assert_eq!(lit.coerce(DataType::Float, "age").unwrap(), Scalar::Float(18.0));
        assert_eq!(
            lit.coerce(DataType::Str, "age").unwrap(),
            Scalar::Str("18".into())
        );
        assert!(Literal::Text("abc".into())
            .coerce(DataType::Int, "age")
            .is_err());
    }

    #[test]
    fn comma_separated_membership() {
        let items = Literal::Text("US, CA".into()).items();
        assert_eq!(
            items,
            vec![Literal::Text("US".into()), Literal::Text("CA".into())]
        );
    }

    #[test]
    fn untagged_parsing_prefers_bool_then_number() {
        let v: Vec<Literal> = serde_json::from_str(r#"[true, 3, "x", [1, "a"]]"#).unwrap();
        assert_eq!(v[0], Literal::Bool(true));
        assert_eq!(v[1], Literal::Number(3.0));
        assert_eq!(v[2], Literal::Text("x".into()));
        assert!(matches!(v[3], Literal::List(_)));
    }
}
