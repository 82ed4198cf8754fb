//! Feature set registry: lifecycle, atomic recompute and read access.
//!
//! Each feature set has a slot with two locks. `writer` serializes every
//! mutation of that set for its whole duration, including the run of the
//! executor. `committed` guards the metadata readers see; it is only taken
//! for writing to swap in a fully built and persisted result, so a preview
//! never waits on a long recompute and never observes a half-built table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use featcraft_core::prelude::{
    DatasetSnapshot, FeatureConfig, FeatureSetId, SnapshotId, Table,
};
use featcraft_exec::replay::hash_table;
use featcraft_exec::{
    analyze, generate, ExecError, Executor, GenerationRequest, InferencePlan, Materialization,
    RelevanceRecord, RunControl, TaskType,
};
use featcraft_ops::project::DropColumnsArgs;
use featcraft_ops::Step;
use featcraft_planner::validate_steps;
use featcraft_store::{codec, Storage, StoreError};

use crate::catalog::SnapshotCatalog;
use crate::error::{RegistryError, Result};
use crate::feature_set::{FeatureSet, FeatureSetState, MaterializationRef};

/// Partial edit of a feature set. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSetUpdate {
    pub name: Option<String>,
    /// New step list; triggers a full recompute.
    pub steps: Option<Vec<Step>>,
    pub active_features: Option<BTreeSet<String>>,
    /// `Some(None)` clears the target.
    pub target_column: Option<Option<String>>,
}

impl FeatureSetUpdate {
    fn touches_metadata(&self) -> bool {
        self.name.is_some() || self.active_features.is_some() || self.target_column.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AutoGenerateRequest {
    pub snapshot_id: SnapshotId,
    /// Extend this feature set; when absent a new one is created.
    pub feature_set_id: Option<FeatureSetId>,
    pub name: Option<String>,
    pub generation: GenerationRequest,
}

/// What a training job reads: the committed table and the model metadata.
#[derive(Debug, Clone)]
pub struct TrainingView {
    pub materialization: Arc<Materialization>,
    pub active_features: Vec<String>,
    pub target_column: Option<String>,
}

impl TrainingView {
    /// The active feature columns, in the order they are listed.
    pub fn features(&self) -> Result<Table> {
        self.materialization
            .table
            .select(&self.active_features)
            .map_err(|e| RegistryError::Metadata(e.to_string()))
    }
}

struct Committed {
    meta: FeatureSet,
    materialization: Option<Arc<Materialization>>,
    /// Steps `materialization` was computed from. Differs from `meta.steps`
    /// while the set is stale.
    materialized_steps: Vec<Step>,
}

struct Slot {
    writer: Mutex<()>,
    committed: RwLock<Committed>,
}

impl Slot {
    fn new(committed: Committed) -> Arc<Self> {
        Arc::new(Self {
            writer: Mutex::new(()),
            committed: RwLock::new(committed),
        })
    }

    fn meta(&self) -> FeatureSet {
        self.committed.read().meta.clone()
    }
}

pub struct FeatureSetRegistry {
    catalog: Arc<dyn SnapshotCatalog>,
    storage: Arc<dyn Storage>,
    executor: Executor,
    config: FeatureConfig,
    slots: RwLock<BTreeMap<FeatureSetId, Arc<Slot>>>,
    next_id: AtomicU64,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn new_version_tag() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("fv_{}", &hex[..8])
}

/// Drop active features and the target when a recompute removed them.
fn prune_metadata(meta: &mut FeatureSet, columns: &[String]) {
    let before = meta.active_features.len();
    meta.active_features.retain(|f| columns.contains(f));
    let pruned = before - meta.active_features.len();
    if pruned > 0 {
        tracing::warn!(feature_set = %meta.id, pruned, "active features no longer exist");
    }
    if let Some(target) = &meta.target_column {
        if !columns.contains(target) {
            tracing::warn!(feature_set = %meta.id, target = %target, "target column no longer exists");
            meta.target_column = None;
        }
    }
}

fn check_metadata(meta: &FeatureSet, columns: &[String]) -> Result<()> {
    let missing: Vec<&String> = meta
        .active_features
        .iter()
        .filter(|f| !columns.contains(f))
        .collect();
    if !missing.is_empty() {
        return Err(RegistryError::Metadata(format!(
            "active features not in the materialized table: {missing:?}"
        )));
    }
    if let Some(target) = &meta.target_column {
        if !columns.contains(target) {
            return Err(RegistryError::Metadata(format!(
                "target column '{target}' not in the materialized table"
            )));
        }
        if meta.active_features.contains(target) {
            return Err(RegistryError::Metadata(format!(
                "target column '{target}' cannot also be an active feature"
            )));
        }
    }
    Ok(())
}

fn apply_metadata(meta: &mut FeatureSet, update: &FeatureSetUpdate, columns: &[String]) -> Result<()> {
    if let Some(name) = &update.name {
        meta.name = name.clone();
    }
    if let Some(active) = &update.active_features {
        meta.active_features = active.clone();
    }
    if let Some(target) = &update.target_column {
        meta.target_column = target.clone();
    }
    check_metadata(meta, columns)
}

/// Committed metadata of a set whose writer lock the caller holds. A set
/// deleted while the caller waited for the lock no longer exists.
fn live_meta(slot: &Slot) -> Result<FeatureSet> {
    let meta = slot.meta();
    if meta.state == FeatureSetState::Deleted {
        return Err(RegistryError::NotFound(meta.id));
    }
    Ok(meta)
}

fn require_materialized(meta: &FeatureSet, action: &'static str) -> Result<()> {
    if meta.state == FeatureSetState::Materialized {
        Ok(())
    } else {
        Err(RegistryError::InvalidState {
            id: meta.id,
            state: meta.state.name(),
            action,
        })
    }
}

impl FeatureSetRegistry {
    pub fn new(
        catalog: Arc<dyn SnapshotCatalog>,
        storage: Arc<dyn Storage>,
        config: FeatureConfig,
    ) -> Self {
        Self {
            catalog,
            storage,
            executor: Executor::new(),
            config,
            slots: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    fn snapshot(&self, id: SnapshotId) -> Result<Arc<DatasetSnapshot>> {
        self.catalog.get(id).ok_or(RegistryError::SnapshotNotFound(id))
    }

    fn slot(&self, id: FeatureSetId) -> Result<Arc<Slot>> {
        self.slots
            .read()
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    fn artifact_dir(&self, id: FeatureSetId) -> String {
        format!("{}/{}/", self.config.store_root.trim_end_matches('/'), id.get())
    }

    fn new_meta(&self, snapshot_id: SnapshotId, name: String, steps: Vec<Step>) -> FeatureSet {
        let now = now_ms();
        FeatureSet {
            id: FeatureSetId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            name,
            snapshot_id,
            version_tag: new_version_tag(),
            steps,
            active_features: BTreeSet::new(),
            target_column: None,
            state: FeatureSetState::Draft,
            materialization: None,
            created_ms: now,
            updated_ms: now,
        }
    }

    /// Run `steps` for `base`'s snapshot. Nothing is stored or swapped.
    fn build(
        &self,
        base: &FeatureSet,
        steps: Vec<Step>,
        control: &RunControl,
    ) -> Result<(FeatureSet, Materialization)> {
        let snapshot = self.snapshot(base.snapshot_id)?;
        let mat = self.executor.execute_with(&snapshot, &steps, control)?;
        let mut next = base.clone();
        next.steps = steps;
        prune_metadata(&mut next, &mat.column_names());
        Ok((next, mat))
    }

    /// Write the artifact for `mat` under a fresh generation and point `next` at it.
    fn persist(&self, next: &mut FeatureSet, mat: &Materialization) -> Result<()> {
        let generation = next.materialization.as_ref().map_or(1, |m| m.generation + 1);
        let path = format!(
            "{}{}-{:06}.fcm",
            self.artifact_dir(next.id),
            next.version_tag,
            generation
        );
        let digest = mat
            .digest()
            .ok_or_else(|| ExecError::Hash("materialization has no output digest".into()))?;
        self.storage.write(&path, &codec::encode(mat)?)?;

        next.materialization = Some(MaterializationRef {
            path,
            generation,
            digest,
            rows: mat.table.num_rows(),
            columns: mat.column_names(),
        });
        next.state = FeatureSetState::Materialized;
        next.updated_ms = now_ms();
        Ok(())
    }

    /// Swap the new result in and drop the artifact it replaces.
    fn commit(&self, slot: &Slot, next: FeatureSet, mat: Materialization) -> FeatureSet {
        let previous = {
            let mut committed = slot.committed.write();
            let previous = committed.meta.materialization.take();
            *committed = Committed {
                meta: next.clone(),
                materialization: Some(Arc::new(mat)),
                materialized_steps: next.steps.clone(),
            };
            previous
        };
        if let (Some(prev), Some(cur)) = (previous, next.materialization.as_ref()) {
            if prev.path != cur.path {
                self.discard(&prev.path);
            }
        }
        tracing::info!(
            feature_set = %next.id,
            version = %next.version_tag,
            generation = next.materialization.as_ref().map_or(0, |m| m.generation),
            "committed materialization"
        );
        next
    }

    fn discard(&self, path: &str) {
        match self.storage.delete(path) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => tracing::warn!(path, error = %e, "failed to remove old artifact"),
        }
    }

    /// Register a feature set without computing it.
    pub fn create_draft(
        &self,
        snapshot_id: SnapshotId,
        name: impl Into<String>,
        steps: Vec<Step>,
    ) -> Result<FeatureSet> {
        let snapshot = self.snapshot(snapshot_id)?;
        validate_steps(snapshot.schema(), &steps).map_err(ExecError::from)?;
        let meta = self.new_meta(snapshot_id, name.into(), steps);
        self.slots.write().insert(
            meta.id,
            Slot::new(Committed {
                meta: meta.clone(),
                materialization: None,
                materialized_steps: Vec::new(),
            }),
        );
        tracing::info!(feature_set = %meta.id, snapshot = %snapshot_id, "created draft");
        Ok(meta)
    }

    /// Create and materialize in one go. Nothing is registered on failure.
    pub fn create(
        &self,
        snapshot_id: SnapshotId,
        name: impl Into<String>,
        steps: Vec<Step>,
    ) -> Result<FeatureSet> {
        self.create_with(snapshot_id, name, steps, &RunControl::default())
    }

    pub fn create_with(
        &self,
        snapshot_id: SnapshotId,
        name: impl Into<String>,
        steps: Vec<Step>,
        control: &RunControl,
    ) -> Result<FeatureSet> {
        self.snapshot(snapshot_id)?;
        let base = self.new_meta(snapshot_id, name.into(), Vec::new());
        let (mut next, mat) = self.build(&base, steps, control)?;
        self.persist(&mut next, &mat)?;
        self.slots.write().insert(
            next.id,
            Slot::new(Committed {
                meta: next.clone(),
                materialization: Some(Arc::new(mat)),
                materialized_steps: next.steps.clone(),
            }),
        );
        tracing::info!(feature_set = %next.id, snapshot = %snapshot_id, "created feature set");
        Ok(next)
    }

    /// Compute the current step list. Valid from draft, stale or
    /// materialized; a failure leaves the set exactly as it was.
    pub fn materialize(&self, id: FeatureSetId) -> Result<FeatureSet> {
        self.materialize_with(id, &RunControl::default())
    }

    pub fn materialize_with(&self, id: FeatureSetId, control: &RunControl) -> Result<FeatureSet> {
        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();
        let current = live_meta(&slot)?;
        let (mut next, mat) = self.build(&current, current.steps.clone(), control)?;
        self.persist(&mut next, &mat)?;
        Ok(self.commit(&slot, next, mat))
    }

    /// Replace the step list without computing it. A materialized set turns
    /// stale and keeps serving its last committed table until the next
    /// successful `materialize`.
    pub fn stage_steps(&self, id: FeatureSetId, steps: Vec<Step>) -> Result<FeatureSet> {
        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();
        let current = live_meta(&slot)?;
        let snapshot = self.snapshot(current.snapshot_id)?;
        validate_steps(snapshot.schema(), &steps).map_err(ExecError::from)?;

        let mut committed = slot.committed.write();
        committed.meta.steps = steps;
        committed.meta.state = if committed.materialization.is_some() {
            FeatureSetState::Stale
        } else {
            FeatureSetState::Draft
        };
        committed.meta.updated_ms = now_ms();
        Ok(committed.meta.clone())
    }

    pub fn update(&self, id: FeatureSetId, update: FeatureSetUpdate) -> Result<FeatureSet> {
        self.update_with(id, update, &RunControl::default())
    }

    /// Apply `update` atomically: new steps are recomputed from the raw
    /// snapshot and committed together with any metadata change, or not at all.
    pub fn update_with(
        &self,
        id: FeatureSetId,
        update: FeatureSetUpdate,
        control: &RunControl,
    ) -> Result<FeatureSet> {
        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();
        let current = live_meta(&slot)?;

        if let Some(steps) = update.steps.clone() {
            let (mut next, mat) = self.build(&current, steps, control)?;
            apply_metadata(&mut next, &update, &mat.column_names())?;
            self.persist(&mut next, &mat)?;
            return Ok(self.commit(&slot, next, mat));
        }

        if !update.touches_metadata() {
            return Ok(current);
        }
        let sets_model_fields = update.active_features.is_some() || update.target_column.is_some();
        if sets_model_fields && current.materialization.is_none() {
            return Err(RegistryError::InvalidState {
                id,
                state: current.state.name(),
                action: "set features or target on",
            });
        }
        let mut next = current.clone();
        apply_metadata(&mut next, &update, current.columns())?;
        next.updated_ms = now_ms();
        slot.committed.write().meta = next.clone();
        Ok(next)
    }

    /// Remove the set and every artifact it owns.
    pub fn delete(&self, id: FeatureSetId) -> Result<FeatureSet> {
        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();
        self.delete_locked(id, &slot)
    }

    fn delete_locked(&self, id: FeatureSetId, slot: &Slot) -> Result<FeatureSet> {
        live_meta(slot)?;
        let meta = {
            let mut committed = slot.committed.write();
            committed.meta.state = FeatureSetState::Deleted;
            committed.meta.updated_ms = now_ms();
            committed.materialization = None;
            committed.meta.clone()
        };
        self.slots.write().remove(&id);

        for path in self.storage.list(&self.artifact_dir(id))? {
            self.discard(&path);
        }
        tracing::info!(feature_set = %id, "deleted feature set");
        Ok(meta)
    }

    pub fn get(&self, id: FeatureSetId) -> Result<FeatureSet> {
        Ok(self.slot(id)?.meta())
    }

    /// All live feature sets, ordered by id.
    pub fn list(&self) -> Vec<FeatureSet> {
        self.slots.read().values().map(|s| s.meta()).collect()
    }

    /// The committed materialization. Never blocks on an in-flight recompute.
    pub fn materialization(&self, id: FeatureSetId) -> Result<Arc<Materialization>> {
        let slot = self.slot(id)?;
        let committed = slot.committed.read();
        committed
            .materialization
            .clone()
            .ok_or(RegistryError::InvalidState {
                id,
                state: committed.meta.state.name(),
                action: "read the materialization of",
            })
    }

    /// First `limit` rows (all rows when `None`) of the committed table,
    /// optionally restricted to `columns` in the given order.
    pub fn preview(
        &self,
        id: FeatureSetId,
        limit: Option<usize>,
        columns: Option<&[String]>,
    ) -> Result<Table> {
        let mat = self.materialization(id)?;
        let table = match columns {
            Some(cols) => {
                let missing: Vec<&String> =
                    cols.iter().filter(|c| !mat.table.has_column(c)).collect();
                if !missing.is_empty() {
                    return Err(RegistryError::Metadata(format!(
                        "columns not found: {missing:?}"
                    )));
                }
                mat.table
                    .select(cols)
                    .map_err(|e| RegistryError::Metadata(e.to_string()))?
            }
            None => mat.table.clone(),
        };
        Ok(match limit {
            Some(n) => table.head(n),
            None => table,
        })
    }

    pub fn analyze(
        &self,
        id: FeatureSetId,
        target: &str,
        features: &[String],
        task: TaskType,
    ) -> Result<Vec<RelevanceRecord>> {
        let mat = self.materialization(id)?;
        Ok(analyze(&mat.table, target, features, task, &self.config)?)
    }

    pub fn auto_generate(&self, req: AutoGenerateRequest) -> Result<FeatureSet> {
        self.auto_generate_with(req, &RunControl::default())
    }

    /// Generate, prune and record candidates as one `auto_gen` step, either
    /// as a new feature set over the raw snapshot or appended to an
    /// existing set (generated from its committed table).
    pub fn auto_generate_with(
        &self,
        req: AutoGenerateRequest,
        control: &RunControl,
    ) -> Result<FeatureSet> {
        let max_columns = self.config.max_generated_columns;
        let Some(id) = req.feature_set_id else {
            let snapshot = self.snapshot(req.snapshot_id)?;
            let outcome = generate(
                snapshot.table(),
                &req.generation,
                self.executor.synthesizer(),
                max_columns,
                control,
            )?;
            let name = req
                .name
                .unwrap_or_else(|| format!("{}_features", req.generation.method.name()));
            return self.create_with(req.snapshot_id, name, vec![outcome.step], control);
        };

        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();
        let current = live_meta(&slot)?;
        let base = slot.committed.read().materialization.clone();
        if current.snapshot_id != req.snapshot_id {
            return Err(RegistryError::Metadata(format!(
                "feature set {id} is built on {}, not {}",
                current.snapshot_id, req.snapshot_id
            )));
        }
        require_materialized(&current, "auto-generate into")?;
        let base = base.ok_or(RegistryError::InvalidState {
            id,
            state: current.state.name(),
            action: "auto-generate into",
        })?;

        let outcome = generate(
            &base.table,
            &req.generation,
            self.executor.synthesizer(),
            max_columns,
            control,
        )?;
        let mut steps = current.steps.clone();
        steps.push(outcome.step);
        let (mut next, mat) = self.build(&current, steps, control)?;
        if let Some(name) = req.name {
            next.name = name;
        }
        self.persist(&mut next, &mat)?;
        Ok(self.commit(&slot, next, mat))
    }

    pub fn delete_columns(&self, id: FeatureSetId, columns: Vec<String>) -> Result<FeatureSet> {
        self.delete_columns_with(id, columns, &RunControl::default())
    }

    /// Drop columns by appending a `drop_columns` step and recomputing.
    pub fn delete_columns_with(
        &self,
        id: FeatureSetId,
        columns: Vec<String>,
        control: &RunControl,
    ) -> Result<FeatureSet> {
        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();
        let current = live_meta(&slot)?;
        require_materialized(&current, "delete columns from")?;

        let missing: Vec<&String> = columns
            .iter()
            .filter(|c| !current.columns().contains(c))
            .collect();
        if columns.is_empty() || !missing.is_empty() {
            return Err(RegistryError::Metadata(format!(
                "columns to delete must be non-empty and exist; missing: {missing:?}"
            )));
        }

        let mut steps = current.steps.clone();
        steps.push(Step::DropColumns(DropColumnsArgs { columns }));
        let (mut next, mat) = self.build(&current, steps, control)?;
        self.persist(&mut next, &mat)?;
        Ok(self.commit(&slot, next, mat))
    }

    pub fn training_view(&self, id: FeatureSetId) -> Result<TrainingView> {
        let slot = self.slot(id)?;
        let committed = slot.committed.read();
        let materialization =
            committed
                .materialization
                .clone()
                .ok_or(RegistryError::InvalidState {
                    id,
                    state: committed.meta.state.name(),
                    action: "build a training view of",
                })?;
        Ok(TrainingView {
            materialization,
            active_features: committed.meta.active_features.iter().cloned().collect(),
            target_column: committed.meta.target_column.clone(),
        })
    }

    /// Steps and fitted parameters of the committed materialization (not of
    /// any staged step list).
    pub fn inference_plan(&self, id: FeatureSetId) -> Result<InferencePlan> {
        let slot = self.slot(id)?;
        let committed = slot.committed.read();
        let mat = committed
            .materialization
            .as_ref()
            .ok_or(RegistryError::InvalidState {
                id,
                state: committed.meta.state.name(),
                action: "build an inference plan for",
            })?;
        Ok(InferencePlan {
            steps: committed.materialized_steps.clone(),
            fitted: mat.fitted.clone(),
        })
    }

    /// Read the persisted artifact back and check it against the recorded digest.
    pub fn load_artifact(&self, id: FeatureSetId) -> Result<Materialization> {
        let meta = self.get(id)?;
        let reference = meta.materialization.ok_or(RegistryError::InvalidState {
            id,
            state: meta.state.name(),
            action: "load the artifact of",
        })?;
        let mat: Materialization = codec::decode(&self.storage.read(&reference.path)?)?;
        let decoded = hash_table(&mat.table)?;
        if mat.digest() != Some(reference.digest) || decoded != reference.digest {
            return Err(StoreError::Corrupt(format!(
                "{} does not match its recorded digest",
                reference.path
            ))
            .into());
        }
        Ok(mat)
    }
}
