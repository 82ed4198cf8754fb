//! Step semantics checked end to end through the executor.

use featcraft_core::prelude::{Column, DataType, DatasetSnapshot, Scalar, SnapshotId, Table};
use featcraft_exec::{ExecError, Executor};
use featcraft_ops::OpError;
use featcraft_planner::parse_steps;
use proptest::prelude::*;

fn snapshot(table: Table) -> DatasetSnapshot {
    DatasetSnapshot::new(SnapshotId::new(1), "test", table)
}

fn run(table: Table, steps: &str) -> Result<Table, ExecError> {
    let steps = parse_steps(steps).expect("steps parse");
    Executor::new()
        .execute(&snapshot(table), &steps)
        .map(|m| m.table)
}

/// group, t, value rows as a table.
fn grouped(rows: &[(u8, i64, i64)]) -> Table {
    Table::new(vec![
        Column::new(
            "g",
            DataType::Str,
            rows.iter().map(|r| Scalar::Str(format!("g{}", r.0))).collect(),
        ),
        Column::new("t", DataType::Int, rows.iter().map(|r| Scalar::Int(r.1)).collect()),
        Column::new(
            "v",
            DataType::Float,
            rows.iter().map(|r| Scalar::Float(r.2 as f64)).collect(),
        ),
    ])
    .unwrap()
}

fn rows_strategy() -> impl Strategy<Value = Vec<(u8, i64, i64)>> {
    prop::collection::vec((0u8..3, 0i64..6, -50i64..50), 1..40)
}

proptest! {
    #[test]
    fn lag_takes_previous_row_of_the_same_group(rows in rows_strategy()) {
        let out = run(grouped(&rows), "- op: lag\n  col: v\n  group_col: g\n  sort_col: t\n").unwrap();
        let lag = &out.column("v_lag_1").unwrap().values;
        for (r, (g, t, _)) in rows.iter().enumerate() {
            // predecessor in (t, original index) order within the group
            let prev = rows
                .iter()
                .enumerate()
                .filter(|(i, (g2, t2, _))| g2 == g && (*t2, *i) < (*t, r))
                .max_by_key(|(i, (_, t2, _))| (*t2, *i))
                .map(|(_, (_, _, v))| *v as f64);
            prop_assert_eq!(lag[r].as_f64(), prev);
        }
    }

    #[test]
    fn as_of_aggregation_only_sees_strictly_earlier_rows(rows in rows_strategy()) {
        let out = run(
            grouped(&rows),
            "- op: groupby_agg\n  cols: v\n  group_col: g\n  func: max\n  date_col: t\n",
        )
        .unwrap();
        let agg = &out.column("v_groupby_agg").unwrap().values;
        for (r, (g, t, _)) in rows.iter().enumerate() {
            let expected = rows
                .iter()
                .filter(|(g2, t2, _)| g2 == g && t2 < t)
                .map(|(_, _, v)| *v)
                .max()
                .map(|v| v as f64);
            prop_assert_eq!(agg[r].as_f64(), expected);
        }
    }

    #[test]
    fn filter_keeps_exactly_matching_rows(rows in rows_strategy(), cut in -50i64..50) {
        let out = run(
            grouped(&rows),
            &format!("- op: filter\n  conditions:\n    - {{col: v, op: gt, val: {cut}}}\n"),
        )
        .unwrap();
        let kept: Vec<Option<f64>> = out.column("v").unwrap().values.iter().map(Scalar::as_f64).collect();
        let expected: Vec<Option<f64>> = rows
            .iter()
            .filter(|r| r.2 > cut)
            .map(|r| Some(r.2 as f64))
            .collect();
        prop_assert_eq!(kept, expected);
    }
}

#[test]
fn as_of_mean_excludes_same_day_rows() {
    let table = grouped(&[(0, 1, 10), (0, 1, 20), (0, 2, 40), (1, 2, 5)]);
    let out = run(
        table,
        "- op: groupby_agg\n  cols: v\n  group_col: g\n  func: mean\n  date_col: t\n",
    )
    .unwrap();
    assert_eq!(
        out.column("v_groupby_agg").unwrap().values,
        vec![Scalar::Null, Scalar::Null, Scalar::Float(15.0), Scalar::Null]
    );
}

#[test]
fn thresholds_blank_values_before_aggregating() {
    let table = grouped(&[(0, 1, 1), (0, 2, 100), (0, 3, 3), (1, 1, 500)]);
    let out = run(
        table,
        "- op: groupby_agg\n  cols: v\n  group_col: g\n  func: count\n  threshold_max: 50\n",
    )
    .unwrap();
    // rows are kept; only the out-of-range values stop counting
    assert_eq!(out.num_rows(), 4);
    assert_eq!(
        out.column("v_groupby_agg").unwrap().values,
        vec![Scalar::Int(2), Scalar::Int(2), Scalar::Int(2), Scalar::Int(0)]
    );
}

#[test]
fn filter_treats_missing_values_as_not_equal() {
    let table = Table::new(vec![Column::new(
        "region",
        DataType::Str,
        vec![
            Scalar::Str("US".into()),
            Scalar::Null,
            Scalar::Str("CA".into()),
        ],
    )])
    .unwrap();
    let eq = run(
        table.clone(),
        "- op: filter\n  conditions:\n    - {col: region, op: eq, val: US}\n",
    )
    .unwrap();
    assert_eq!(eq.num_rows(), 1);

    let neq = run(
        table.clone(),
        "- op: filter\n  conditions:\n    - {col: region, op: neq, val: US}\n",
    )
    .unwrap();
    assert_eq!(neq.column("region").unwrap().values, vec![Scalar::Null, Scalar::Str("CA".into())]);

    let not_in = run(
        table,
        "- op: filter\n  conditions:\n    - {col: region, op: not_in, val: [US, CA]}\n",
    )
    .unwrap();
    assert_eq!(not_in.column("region").unwrap().values, vec![Scalar::Null]);
}

#[test]
fn custom_formula_is_sandboxed() {
    let table = grouped(&[(0, 1, 2), (0, 2, 0)]);
    let out = run(
        table.clone(),
        "- op: custom_formula\n  expression: \"v / t + pow(v, 2)\"\n  new_col: score\n",
    )
    .unwrap();
    assert_eq!(
        out.column("score").unwrap().values,
        vec![Scalar::Float(6.0), Scalar::Float(0.0)]
    );

    let err = run(
        table,
        "- op: custom_formula\n  expression: \"__import__('os').system('ls')\"\n  new_col: x\n",
    )
    .unwrap_err();
    match err {
        ExecError::Validation(e) => {
            assert_eq!(e.step_index, 0);
            assert!(matches!(e.source, OpError::InvalidExpression(_)));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn later_steps_read_earlier_outputs_but_not_the_reverse() {
    let table = grouped(&[(0, 1, 2), (0, 2, 4)]);
    let ok = run(
        table.clone(),
        "- op: log\n  col: v\n- op: diff\n  col: v_log\n",
    )
    .unwrap();
    assert!(ok.has_column("v_log_diff_1"));

    let err = run(table, "- op: diff\n  col: v_log\n- op: log\n  col: v\n").unwrap_err();
    assert_eq!(err.step_index(), Some(0));
    assert!(matches!(err, ExecError::Validation(ref e) if e.is_missing_column()));
}

#[test]
fn snapshot_is_left_untouched() {
    let snap = snapshot(grouped(&[(0, 1, 2), (1, 2, 4)]));
    let before = snap.table().clone();
    let steps = parse_steps("- op: drop_columns\n  columns: [v]\n").unwrap();
    let mat = Executor::new().execute(&snap, &steps).unwrap();
    assert!(!mat.table.has_column("v"));
    assert_eq!(snap.table(), &before);
}

#[test]
fn numeric_looking_group_keys_are_not_merged_or_split() {
    let s = |v: &str| Scalar::Str(v.into());
    let table = Table::new(vec![
        Column::new("g", DataType::Str, vec![s("1"), s("01"), s("1")]),
        Column::new("t", DataType::Int, vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]),
        Column::new(
            "v",
            DataType::Float,
            vec![Scalar::Float(10.0), Scalar::Float(20.0), Scalar::Float(30.0)],
        ),
    ])
    .unwrap();
    let out = run(table, "- op: lag\n  col: v\n  group_col: g\n  sort_col: t\n").unwrap();
    assert_eq!(
        out.column("v_lag_1").unwrap().values,
        vec![Scalar::Null, Scalar::Null, Scalar::Float(10.0)]
    );
}

#[test]
fn unemitted_indicator_is_a_missing_column() {
    let s = |v: &str| Scalar::Str(v.into());
    let table = Table::new(vec![Column::new("region", DataType::Str, vec![s("US"), s("CA")])]).unwrap();

    let err = run(table.clone(), "- op: onehot\n  col: region\n- op: log\n  col: region_MX\n").unwrap_err();
    assert_eq!(err.step_index(), Some(1));
    assert!(matches!(err, ExecError::Validation(ref e) if e.is_missing_column()));

    let ok = run(table, "- op: onehot\n  col: region\n- op: log\n  col: region_US\n").unwrap();
    assert_eq!(ok.column("region_US_log").unwrap().values[1], Scalar::Float(0.0));
}
