//! Run manifest: what went into a materialization and what came out.
//!
//! Two runs of the same step list over the same snapshot agree on
//! `steps_hash`, `inputs_digest` and `outputs_digest`; only the run id and
//! timestamps differ.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;
use crate::id::SnapshotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub snapshot_id: SnapshotId,
    pub steps_hash: Hash256,
    pub step_count: usize,
    pub engine_version: String,
    pub inputs_digest: Option<Hash256>,
    pub outputs_digest: Option<Hash256>,
    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn start(snapshot_id: SnapshotId, steps_hash: Hash256, step_count: usize, started_ms: u64) -> Self {
        Self {
            run_id: RunId(Uuid::new_v4()),
            snapshot_id,
            steps_hash,
            step_count,
            engine_version: crate::VERSION.to_string(),
            inputs_digest: None,
            outputs_digest: None,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn with_inputs(mut self, inputs_digest: Hash256) -> Self {
        self.inputs_digest = Some(inputs_digest);
        self
    }

    pub fn finish(mut self, finished_ms: u64, outputs_digest: Hash256) -> Self {
        self.finished_ms = finished_ms;
        self.outputs_digest = Some(outputs_digest);
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_ms.saturating_sub(self.started_ms)
    }

    /// Same inputs, same steps, same output.
    pub fn reproduces(&self, other: &RunManifest) -> bool {
        self.steps_hash == other.steps_hash
            && self.inputs_digest == other.inputs_digest
            && self.outputs_digest.is_some()
            && self.outputs_digest == other.outputs_digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    #[test]
    fn reproduction_ignores_run_identity_and_timing() {
        let steps = hash_bytes(b"steps");
        let a = RunManifest::start(SnapshotId::new(1), steps, 2, 10)
            .with_inputs(hash_bytes(b"in"))
            .finish(25, hash_bytes(b"out"));
        let b = RunManifest::start(SnapshotId::new(1), steps, 2, 100)
            .with_inputs(hash_bytes(b"in"))
            .finish(101, hash_bytes(b"out"));
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.duration_ms(), 15);
        assert!(a.reproduces(&b));

        let unfinished = RunManifest::start(SnapshotId::new(1), steps, 2, 0);
        assert!(!unfinished.reproduces(&unfinished.clone()));
    }
}
