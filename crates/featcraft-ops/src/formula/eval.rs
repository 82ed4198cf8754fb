//! Vectorized interpreter over the formula AST.
//!
//! Every node evaluates to one value per row. Arithmetic on a missing value
//! or a non-finite result yields missing; comparisons with a missing side
//! yield missing.

use featcraft_core::prelude::{Column, DataType, Scalar, Table};

use crate::traits::OpError;

use super::parser::{BinOp, CmpOp, Expr, Func};

#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Num(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
}

impl Series {
    fn into_numbers(self) -> Vec<Option<f64>> {
        match self {
            Series::Num(v) => v,
            Series::Bool(v) => v
                .into_iter()
                .map(|b| b.map(|b| if b { 1.0 } else { 0.0 }))
                .collect(),
        }
    }

    /// Materialize as a column: comparisons give bool, everything else float.
    pub fn into_column(self, name: &str) -> Column {
        match self {
            Series::Num(v) => Column::from_f64s(name, v),
            Series::Bool(v) => Column::new(
                name,
                DataType::Bool,
                v.into_iter()
                    .map(|b| b.map(Scalar::Bool).unwrap_or(Scalar::Null))
                    .collect(),
            ),
        }
    }
}

fn finite(v: f64) -> Option<f64> {
    Some(v).filter(|v| v.is_finite())
}

pub fn evaluate(expr: &Expr, table: &Table) -> Result<Series, OpError> {
    let rows = table.num_rows();
    Ok(match expr {
        Expr::Number(v) => Series::Num(vec![Some(*v); rows]),
        Expr::Column(name) => {
            let column = table.column(name)?;
            match column.data_type {
                DataType::Str => {
                    return Err(OpError::InvalidExpression(format!(
                        "column '{name}' is text and cannot be used in a formula"
                    )))
                }
                DataType::Bool => Series::Bool(
                    column
                        .values
                        .iter()
                        .map(|v| match v {
                            Scalar::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect(),
                ),
                _ => Series::Num(column.values.iter().map(Scalar::as_f64).collect()),
            }
        }
        Expr::Neg(inner) => Series::Num(
            evaluate(inner, table)?
                .into_numbers()
                .into_iter()
                .map(|v| v.map(|x| -x))
                .collect(),
        ),
        Expr::Binary { op, lhs, rhs } => {
            let a = evaluate(lhs, table)?.into_numbers();
            let b = evaluate(rhs, table)?.into_numbers();
            Series::Num(
                a.into_iter()
                    .zip(b)
                    .map(|(x, y)| {
                        let (x, y) = (x?, y?);
                        match op {
                            BinOp::Add => finite(x + y),
                            BinOp::Sub => finite(x - y),
                            BinOp::Mul => finite(x * y),
                            BinOp::Div if y == 0.0 => None,
                            BinOp::Div => finite(x / y),
                        }
                    })
                    .collect(),
            )
        }
        Expr::Compare { op, lhs, rhs } => {
            let a = evaluate(lhs, table)?.into_numbers();
            let b = evaluate(rhs, table)?.into_numbers();
            Series::Bool(
                a.into_iter()
                    .zip(b)
                    .map(|(x, y)| {
                        let (x, y) = (x?, y?);
                        Some(match op {
                            CmpOp::Gt => x > y,
                            CmpOp::Lt => x < y,
                            CmpOp::Ge => x >= y,
                            CmpOp::Le => x <= y,
                            CmpOp::Eq => x == y,
                            CmpOp::Ne => x != y,
                        })
                    })
                    .collect(),
            )
        }
        Expr::Call { func, args } => {
            let evaluated = args
                .iter()
                .map(|a| evaluate(a, table).map(Series::into_numbers))
                .collect::<Result<Vec<_>, _>>()?;
            Series::Num(
                (0..rows)
                    .map(|row| call(*func, &evaluated, row))
                    .collect(),
            )
        }
    })
}

fn call(func: Func, args: &[Vec<Option<f64>>], row: usize) -> Option<f64> {
    let x = args.first()?[row]?;
    let second = || args.get(1).and_then(|a| a[row]);
    let v = match func {
        Func::Abs => x.abs(),
        Func::Sqrt => x.sqrt(),
        Func::Log => x.ln(),
        Func::Log1p => x.ln_1p(),
        Func::Exp => x.exp(),
        Func::Floor => x.floor(),
        Func::Ceil => x.ceil(),
        Func::Min => x.min(second()?),
        Func::Max => x.max(second()?),
        Func::Pow => x.powf(second()?),
        Func::Round => match args.get(1) {
            None => x.round(),
            Some(_) => {
                let factor = 10f64.powi(second()? as i32);
                (x * factor).round() / factor
            }
        },
    };
    finite(v)
}
