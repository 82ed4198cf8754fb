//! In-memory storage backend.
//!
//! HashMap-based; clones share the same underlying map.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::storage::Storage;

#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.data.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.data.lock().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data = self.data.lock();
        let bytes = data
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.data.lock().remove(path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .data
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn size(&self, path: &str) -> Result<u64> {
        self.data
            .lock()
            .get(path)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_and_range() {
        let storage = MemoryStorage::new();
        storage.write("fs/1/v-1.json", b"hello world").unwrap();
        assert_eq!(storage.read("fs/1/v-1.json").unwrap(), b"hello world");
        assert_eq!(storage.read_range("fs/1/v-1.json", 6, 50).unwrap(), b"world");
        assert!(matches!(
            storage.read("fs/2/v-1.json"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_is_prefix_scoped_and_sorted() {
        let storage = MemoryStorage::new();
        storage.write("fs/1/b", b"2").unwrap();
        storage.write("fs/1/a", b"1").unwrap();
        storage.write("fs/10/a", b"3").unwrap();
        assert_eq!(storage.list("fs/1/").unwrap(), vec!["fs/1/a", "fs/1/b"]);

        storage.delete("fs/1/a").unwrap();
        storage.delete("fs/1/a").unwrap();
        assert_eq!(storage.len(), 2);
    }
}
