//! Step-list documents.
//!
//! Either a bare list or a document with a `steps:` key; JSON is accepted
//! too since it parses as YAML.
//! ```yaml
//! steps:
//!   - op: lag
//!     col: sales
//!     group_col: store
//!     sort_col: date
//!   - op: filter
//!     conditions:
//!       - { col: region, op: in, val: "US,CA" }
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use featcraft_ops::Step;

#[derive(Debug, Error)]
pub enum DslError {
    #[error("malformed step document: {0}")]
    Document(String),

    #[error("step {step_index} ({op}): {reason}")]
    Step {
        step_index: usize,
        op: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepDocument {
    steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSteps {
    Document(StepDocument),
    List(Vec<Value>),
}

/// Parse a step list. Each entry is decoded on its own so an unknown op or
/// malformed arguments are reported with their position.
pub fn parse_steps(src: &str) -> Result<Vec<Step>, DslError> {
    if src.trim().is_empty() {
        return Ok(Vec::new());
    }
    let raw: RawSteps =
        serde_yaml::from_str(src).map_err(|e| DslError::Document(e.to_string()))?;
    let values = match raw {
        RawSteps::Document(doc) => doc.steps,
        RawSteps::List(list) => list,
    };

    values
        .into_iter()
        .enumerate()
        .map(|(step_index, value)| {
            let op = value
                .get("op")
                .and_then(Value::as_str)
                .unwrap_or("<missing>")
                .to_string();
            serde_yaml::from_value::<Step>(value).map_err(|e| DslError::Step {
                step_index,
                op,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Render a step list as a `steps:` document.
pub fn steps_to_yaml(steps: &[Step]) -> Result<String, DslError> {
    #[derive(Serialize)]
    struct Out<'a> {
        steps: &'a [Step],
    }
    serde_yaml::to_string(&Out { steps }).map_err(|e| DslError::Document(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_and_bare_list() {
        let doc = r#"
steps:
  - op: log
    col: price
  - op: fillna
    col: qty
    value: 0
"#;
        let steps = parse_steps(doc).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].name(), "fillna");

        let json = r#"[{"op":"clip","col":"price","upper":100}]"#;
        let steps = parse_steps(json).unwrap();
        assert_eq!(steps[0].name(), "clip");
    }

    #[test]
    fn unknown_op_reports_its_position() {
        let src = r#"
- op: log
  col: price
- op: explode
  col: tags
"#;
        match parse_steps(src) {
            Err(DslError::Step { step_index, op, .. }) => {
                assert_eq!(step_index, 1);
                assert_eq!(op, "explode");
            }
            other => panic!("expected step error, got {other:?}"),
        }
    }

    #[test]
    fn yaml_output_parses_back() {
        let steps = parse_steps("- op: drop_columns\n  columns: [a]\n").unwrap();
        let text = steps_to_yaml(&steps).unwrap();
        assert!(text.starts_with("steps:"));
        assert_eq!(parse_steps(&text).unwrap(), steps);
    }

    #[test]
    fn empty_source_is_an_empty_list() {
        assert!(parse_steps("  \n").unwrap().is_empty());
    }
}
