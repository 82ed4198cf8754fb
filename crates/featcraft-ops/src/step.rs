//! The closed set of step kinds, as written in step lists.
//!
//! ```yaml
//! - op: lag
//!   col: sales
//!   group_col: store
//!   sort_col: date
//!   periods: 1
//! - op: scale_standard
//!   col: sales_lag_1
//! ```

use serde::{Deserialize, Serialize};

use crate::autogen::AutoGenArgs;
use crate::encode::{OnehotArgs, TargetEncodeArgs};
use crate::filter::FilterArgs;
use crate::formula::FormulaArgs;
use crate::groupby::GroupbyAggArgs;
use crate::math::{ArithmeticArgs, ClipArgs, FillnaArgs, LogArgs, PolynomialArgs};
use crate::project::DropColumnsArgs;
use crate::scale::{MinMaxScaleArgs, StandardScaleArgs};
use crate::time_series::{DiffArgs, LagArgs, RollingArgs};
use crate::traits::Operator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Lag(LagArgs),
    Rolling(RollingArgs),
    Diff(DiffArgs),
    GroupbyAgg(GroupbyAggArgs),
    ScaleStandard(StandardScaleArgs),
    ScaleMinmax(MinMaxScaleArgs),
    Onehot(OnehotArgs),
    TargetEncode(TargetEncodeArgs),
    Log(LogArgs),
    Fillna(FillnaArgs),
    Clip(ClipArgs),
    Arithmetic(ArithmeticArgs),
    Polynomial(PolynomialArgs),
    CustomFormula(FormulaArgs),
    Filter(FilterArgs),
    DropColumns(DropColumnsArgs),
    AutoGen(AutoGenArgs),
}

impl Step {
    pub fn as_operator(&self) -> &dyn Operator {
        match self {
            Step::Lag(a) => a,
            Step::Rolling(a) => a,
            Step::Diff(a) => a,
            Step::GroupbyAgg(a) => a,
            Step::ScaleStandard(a) => a,
            Step::ScaleMinmax(a) => a,
            Step::Onehot(a) => a,
            Step::TargetEncode(a) => a,
            Step::Log(a) => a,
            Step::Fillna(a) => a,
            Step::Clip(a) => a,
            Step::Arithmetic(a) => a,
            Step::Polynomial(a) => a,
            Step::CustomFormula(a) => a,
            Step::Filter(a) => a,
            Step::DropColumns(a) => a,
            Step::AutoGen(a) => a,
        }
    }

    pub fn name(&self) -> &'static str {
        self.as_operator().name()
    }

    /// Steps that learn parameters from the rows they see.
    pub fn is_fitted(&self) -> bool {
        matches!(
            self,
            Step::ScaleStandard(_) | Step::ScaleMinmax(_) | Step::Onehot(_) | Step::TargetEncode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ArithOp, Operand};

    #[test]
    fn parses_yaml_step_list() {
        let src = r#"
- op: lag
  col: sales
  group_col: store
  sort_col: date
- op: arithmetic
  col: price
  operator: mul
  operand_type: column
  right_col: qty
  new_col: revenue
- op: custom_formula
  expression: "log1p(revenue) * 2"
  new_col: score
"#;
        let steps: Vec<Step> = serde_yaml::from_str(src).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].name(), "lag");
        match &steps[0] {
            Step::Lag(a) => assert_eq!(a.periods, 1),
            other => panic!("unexpected {other:?}"),
        }
        match &steps[1] {
            Step::Arithmetic(a) => {
                assert_eq!(a.operator, ArithOp::Mul);
                assert_eq!(
                    a.operand,
                    Operand::Column {
                        right_col: "qty".into()
                    }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(steps[2].name(), "custom_formula");
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = serde_json::from_str::<Step>(r#"{"op":"pivot","col":"x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn json_shape_uses_op_tag() {
        let step: Step =
            serde_json::from_str(r#"{"op":"drop_columns","columns":["a","b"]}"#).unwrap();
        let v = serde_json::to_value(&step).unwrap();
        assert_eq!(v["op"], "drop_columns");
        assert_eq!(v["columns"][1], "b");
        assert!(!step.is_fitted());
    }
}
