#![forbid(unsafe_code)]
//! featcraft-store: where materializations and snapshots live.
//!
//! - `Storage` trait with `MemoryStorage` and `FsStorage` backends.
//! - `codec`: header + blake3 checksum framing for JSON artifacts, so a
//!   truncated or corrupted artifact is detected on read.
//! - `csv`: load a CSV file into a typed `Table` (with type inference) and
//!   write tables back out.

pub mod codec;
pub mod csv;
pub mod error;
pub mod fs;
pub mod memory_storage;
pub mod storage;

pub use error::{Result, StoreError};
pub use fs::FsStorage;
pub use memory_storage::MemoryStorage;
pub use storage::Storage;
