use featcraft_core::prelude::{FeatureSetId, SnapshotId};
use featcraft_exec::ExecError;
use featcraft_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("feature set {0} not found")]
    NotFound(FeatureSetId),

    #[error("snapshot {0} not found")]
    SnapshotNotFound(SnapshotId),

    #[error("feature set {id} is {state}; cannot {action}")]
    InvalidState {
        id: FeatureSetId,
        state: &'static str,
        action: &'static str,
    },

    #[error("invalid metadata: {0}")]
    Metadata(String),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("job failed: {0}")]
    Job(String),
}

impl RegistryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistryError::Exec(ExecError::Cancelled { .. }))
    }
}
