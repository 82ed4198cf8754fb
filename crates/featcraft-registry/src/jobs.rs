//! Background jobs for long registry operations.
//!
//! Work runs on tokio's blocking pool; callers get a handle with a status
//! channel, a cancel switch and the final result. Cancellation is
//! cooperative: the executor checks the flag between steps and a cancelled
//! run commits nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use featcraft_core::prelude::{FeatureSetId, JobId};
use featcraft_exec::RunControl;

use crate::error::{RegistryError, Result};
use crate::feature_set::FeatureSet;
use crate::registry::{AutoGenerateRequest, FeatureSetRegistry, FeatureSetUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running { completed: usize, total: usize },
    Completed { feature_set: FeatureSetId },
    Failed { reason: String },
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

pub struct JobHandle {
    id: JobId,
    status: watch::Receiver<JobStatus>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<Result<FeatureSet>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// A receiver that sees every later status change.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub async fn wait(self) -> Result<FeatureSet> {
        self.join
            .await
            .map_err(|e| RegistryError::Job(e.to_string()))?
    }
}

#[derive(Clone)]
pub struct JobRunner {
    registry: Arc<FeatureSetRegistry>,
    next_id: Arc<AtomicU64>,
}

impl JobRunner {
    pub fn new(registry: Arc<FeatureSetRegistry>) -> Self {
        Self {
            registry,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn registry(&self) -> &Arc<FeatureSetRegistry> {
        &self.registry
    }

    pub fn materialize(&self, id: FeatureSetId) -> JobHandle {
        self.spawn("materialize", move |reg, control| {
            reg.materialize_with(id, control)
        })
    }

    pub fn update(&self, id: FeatureSetId, update: FeatureSetUpdate) -> JobHandle {
        self.spawn("update", move |reg, control| {
            reg.update_with(id, update, control)
        })
    }

    pub fn auto_generate(&self, req: AutoGenerateRequest) -> JobHandle {
        self.spawn("auto_generate", move |reg, control| {
            reg.auto_generate_with(req, control)
        })
    }

    pub fn delete_columns(&self, id: FeatureSetId, columns: Vec<String>) -> JobHandle {
        self.spawn("delete_columns", move |reg, control| {
            reg.delete_columns_with(id, columns, control)
        })
    }

    /// Must be called from within a tokio runtime.
    fn spawn<F>(&self, kind: &'static str, work: F) -> JobHandle
    where
        F: FnOnce(&FeatureSetRegistry, &RunControl) -> Result<FeatureSet> + Send + 'static,
    {
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = watch::channel(JobStatus::Pending);
        let tx = Arc::new(tx);
        let cancel = Arc::new(AtomicBool::new(false));

        let progress_tx = Arc::clone(&tx);
        let control = RunControl::new()
            .with_cancel_flag(Arc::clone(&cancel))
            .with_progress(move |completed, total| {
                progress_tx.send_replace(JobStatus::Running { completed, total });
            });
        let registry = Arc::clone(&self.registry);

        let join = tokio::task::spawn_blocking(move || {
            tracing::info!(job = %id, kind, "job started");
            tx.send_replace(JobStatus::Running {
                completed: 0,
                total: 0,
            });
            let result = work(&registry, &control);
            let status = match &result {
                Ok(fs) => JobStatus::Completed { feature_set: fs.id },
                Err(e) if e.is_cancelled() => JobStatus::Cancelled,
                Err(e) => JobStatus::Failed {
                    reason: e.to_string(),
                },
            };
            match &status {
                JobStatus::Failed { reason } => tracing::warn!(job = %id, kind, %reason, "job failed"),
                other => tracing::info!(job = %id, kind, status = ?other, "job finished"),
            }
            tx.send_replace(status);
            result
        });

        JobHandle {
            id,
            status: rx,
            cancel,
            join,
        }
    }
}
