//! Abstract storage interface for materialization artifacts.

use crate::error::Result;

/// Implemented by `FsStorage` for the local filesystem and `MemoryStorage`
/// for tests and ephemeral registries.
pub trait Storage: Send + Sync {
    /// Write bytes to a path. Creates parent directories if needed.
    /// Readers never observe a partially written object.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read a byte range from a path. Short reads at end of object are allowed.
    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Delete a path. Idempotent (no error if path doesn't exist).
    fn delete(&self, path: &str) -> Result<()>;

    /// List all paths under a prefix, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Size of a path in bytes.
    fn size(&self, path: &str) -> Result<u64>;

    /// Read a whole object.
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let len = self.size(path)?;
        self.read_range(path, 0, len as usize)
    }
}
