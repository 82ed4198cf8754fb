//! featcraft CLI: run, validate and inspect feature pipelines over CSV data.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use featcraft_core::prelude::{DatasetSnapshot, FeatureConfig, SnapshotId, Table};
use featcraft_exec::{analyze, generate, Executor, GenerationRequest, RunControl, TaskType};
use featcraft_ops::autogen::GenMethod;
use featcraft_ops::Step;
use featcraft_planner::{lineage, parse_steps, steps_to_yaml, validate_steps};
use featcraft_registry::{FeatureSet, FeatureSetRegistry, InMemoryCatalog, JobRunner, JobStatus};
use featcraft_store::csv::{read_csv_path, write_csv, write_csv_path};
use featcraft_store::FsStorage;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "featcraft")]
#[command(about = "featcraft: reproducible feature pipelines over tabular snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Arithmetic,
    Polynomial,
    FeatureSynthesis,
}

impl From<MethodArg> for GenMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Arithmetic => GenMethod::Arithmetic,
            MethodArg::Polynomial => GenMethod::Polynomial,
            MethodArg::FeatureSynthesis => GenMethod::FeatureSynthesis,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TaskArg {
    Regression,
    Classification,
}

impl From<TaskArg> for TaskType {
    fn from(t: TaskArg) -> Self {
        match t {
            TaskArg::Regression => TaskType::Regression,
            TaskArg::Classification => TaskType::Classification,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize a step list over a CSV snapshot
    Run {
        /// Snapshot CSV (header row required)
        #[arg(short, long)]
        data: PathBuf,

        /// Step list YAML
        #[arg(short, long)]
        steps: PathBuf,

        /// Write the full materialized table here
        #[arg(long)]
        out: Option<PathBuf>,

        /// Rows to print (defaults to FEATCRAFT_PREVIEW_LIMIT)
        #[arg(long)]
        preview: Option<usize>,
    },

    /// Check a step list against a snapshot's schema without running it
    Validate {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        steps: PathBuf,
    },

    /// Score columns against a target
    Analyze {
        #[arg(short, long)]
        data: PathBuf,

        /// Optional step list to materialize first
        #[arg(short, long)]
        steps: Option<PathBuf>,

        #[arg(long)]
        target: String,

        #[arg(long, value_enum, default_value = "regression")]
        task: TaskArg,

        /// Comma-separated candidates (all other columns when omitted)
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
    },

    /// Generate candidate features and print the provenance step
    Autogen {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long, value_enum)]
        method: MethodArg,

        /// Comma-separated source columns (numeric columns when omitted)
        #[arg(long, value_delimiter = ',')]
        source: Vec<String>,

        #[arg(long)]
        target: Option<String>,

        #[arg(long, default_value_t = 0.0)]
        variance_threshold: f64,

        #[arg(long, default_value_t = 0.95)]
        correlation_threshold: f64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            steps,
            out,
            preview,
        } => {
            if let Err(e) = run_pipeline(&data, &steps, out.as_deref(), preview) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { data, steps } => {
            if let Err(e) = validate_pipeline(&data, &steps) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Pipeline is valid");
        }
        Commands::Analyze {
            data,
            steps,
            target,
            task,
            features,
        } => {
            if let Err(e) = analyze_columns(&data, steps.as_deref(), &target, task.into(), &features) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Autogen {
            data,
            method,
            source,
            target,
            variance_threshold,
            correlation_threshold,
        } => {
            let mut req = GenerationRequest::new(method.into());
            req.source_columns = (!source.is_empty()).then_some(source);
            req.target_column = target;
            req.variance_threshold = variance_threshold;
            req.correlation_threshold = correlation_threshold;
            if let Err(e) = autogen(&data, &req) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_snapshot(path: &Path) -> CliResult<DatasetSnapshot> {
    let table = read_csv_path(path, None)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    Ok(DatasetSnapshot::new(SnapshotId::new(1), name, table))
}

fn load_steps(path: &Path) -> CliResult<Vec<Step>> {
    let src = fs::read_to_string(path)?;
    Ok(parse_steps(&src)?)
}

fn run_pipeline(
    data: &Path,
    steps_path: &Path,
    out: Option<&Path>,
    preview: Option<usize>,
) -> CliResult<()> {
    let config = FeatureConfig::from_env();
    let preview = preview.unwrap_or(config.preview_limit);
    let snapshot = load_snapshot(data)?;
    let name = snapshot.name.clone();
    let steps = load_steps(steps_path)?;

    let catalog = Arc::new(InMemoryCatalog::new());
    let snapshot_id = catalog.insert(snapshot).id;
    let registry = Arc::new(FeatureSetRegistry::new(
        catalog,
        Arc::new(FsStorage::new()),
        config,
    ));
    let draft = registry.create_draft(snapshot_id, name, steps)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let feature_set: FeatureSet = runtime.block_on(async {
        let handle = JobRunner::new(Arc::clone(&registry)).materialize(draft.id);
        let mut status = handle.subscribe();
        let progress = tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let current = status.borrow_and_update().clone();
                if let JobStatus::Running { completed, total } = current {
                    if total > 0 {
                        tracing::info!(completed, total, "materializing");
                    }
                }
            }
        });
        let result = handle.wait().await;
        let _ = progress.await;
        result
    })?;

    let mat = registry.materialization(feature_set.id)?;
    println!("✓ Pipeline executed successfully");
    println!("  Duration: {}ms", mat.manifest.duration_ms());
    println!("  Steps hash: {}", mat.manifest.steps_hash.short_hex(16));
    println!("  Version: {}", feature_set.version_tag);
    if let Some(reference) = &feature_set.materialization {
        println!("  Artifact: {}", reference.path);
        println!("  Shape: {} rows x {} columns", reference.rows, reference.columns.len());
    }

    write_csv(&registry.preview(feature_set.id, Some(preview), None)?, std::io::stdout())?;
    if let Some(out) = out {
        write_csv_path(&mat.table, out)?;
        println!("  Wrote {}", out.display());
    }
    Ok(())
}

fn validate_pipeline(data: &Path, steps_path: &Path) -> CliResult<()> {
    let snapshot = load_snapshot(data)?;
    let steps = load_steps(steps_path)?;
    let validated = validate_steps(snapshot.schema(), &steps)?;

    for entry in lineage(snapshot.schema(), &steps)? {
        println!(
            "[{}] {:<14} reads {:?} writes {:?}{}",
            entry.step_index,
            entry.op,
            entry.reads,
            entry.writes,
            if entry.removes_rows { " (filters rows)" } else { "" }
        );
    }
    println!("Output columns: {}", validated.output_schema.names().join(", "));
    Ok(())
}

fn analyze_columns(
    data: &Path,
    steps_path: Option<&Path>,
    target: &str,
    task: TaskType,
    features: &[String],
) -> CliResult<()> {
    let config = FeatureConfig::from_env();
    let snapshot = load_snapshot(data)?;
    let table: Table = match steps_path {
        Some(path) => Executor::new().execute(&snapshot, &load_steps(path)?)?.table,
        None => snapshot.table().clone(),
    };
    let records = analyze(&table, target, features, task, &config)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn autogen(data: &Path, req: &GenerationRequest) -> CliResult<()> {
    let config = FeatureConfig::from_env();
    let snapshot = load_snapshot(data)?;
    let executor = Executor::new();
    let outcome = generate(
        snapshot.table(),
        req,
        executor.synthesizer(),
        config.max_generated_columns,
        &RunControl::new(),
    )?;
    eprintln!(
        "kept {} of {} candidates",
        outcome.columns.len(),
        outcome.candidates
    );
    print!("{}", steps_to_yaml(&[outcome.step])?);
    Ok(())
}
