use criterion::{criterion_group, criterion_main, Criterion};
use featcraft_core::prelude::{Column, DataType, DatasetSnapshot, Scalar, SnapshotId, Table};
use featcraft_exec::Executor;
use featcraft_planner::parse_steps;

fn make_snapshot(rows: usize) -> DatasetSnapshot {
    let mut stores = Vec::with_capacity(rows);
    let mut days = Vec::with_capacity(rows);
    let mut sales = Vec::with_capacity(rows);
    for i in 0..rows {
        stores.push(Scalar::Str(format!("store-{}", i % 8)));
        days.push(Scalar::Int((i / 8) as i64));
        sales.push(Scalar::Float((i % 17) as f64 * 1.5));
    }
    let table = Table::new(vec![
        Column::new("store", DataType::Str, stores),
        Column::new("day", DataType::Int, days),
        Column::new("sales", DataType::Float, sales),
    ])
    .expect("bench table");
    DatasetSnapshot::new(SnapshotId::new(1), "bench", table)
}

const STEPS: &str = r#"
- op: lag
  col: sales
  group_col: store
  sort_col: day
- op: rolling
  col: sales
  window: 7
  func: mean
  group_col: store
  sort_col: day
- op: groupby_agg
  cols: sales
  group_col: store
  func: mean
  date_col: day
- op: onehot
  col: store
- op: scale_standard
  col: sales
"#;

fn bench_executor(c: &mut Criterion) {
    let snapshot = make_snapshot(10_000);
    let steps = parse_steps(STEPS).expect("bench steps");
    let executor = Executor::new();
    c.bench_function("execute_time_series_pipeline_10k", |b| {
        b.iter(|| {
            let mat = executor.execute(&snapshot, &steps).expect("execute");
            criterion::black_box(mat.table.num_rows());
        })
    });
}

criterion_group!(benches, bench_executor);
criterion_main!(benches);
