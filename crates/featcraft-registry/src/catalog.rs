//! Snapshot lookup. Snapshots are owned elsewhere; the registry only
//! resolves references to them.

use std::collections::HashMap;
use std::sync::Arc;

use featcraft_core::prelude::{DatasetSnapshot, SnapshotId};
use parking_lot::RwLock;

pub trait SnapshotCatalog: Send + Sync {
    fn get(&self, id: SnapshotId) -> Option<Arc<DatasetSnapshot>>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    snapshots: RwLock<HashMap<SnapshotId, Arc<DatasetSnapshot>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: DatasetSnapshot) -> Arc<DatasetSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshots.write().insert(snapshot.id, Arc::clone(&snapshot));
        snapshot
    }

    pub fn remove(&self, id: SnapshotId) -> Option<Arc<DatasetSnapshot>> {
        self.snapshots.write().remove(&id)
    }
}

impl SnapshotCatalog for InMemoryCatalog {
    fn get(&self, id: SnapshotId) -> Option<Arc<DatasetSnapshot>> {
        self.snapshots.read().get(&id).cloned()
    }
}
