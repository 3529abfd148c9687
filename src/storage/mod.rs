//! Storage adapter subsystem
//!
//! The contract every backend implements, the physical task it receives,
//! logical/native path translation and the reference filesystem adapter.
//!
//! # Accepted task shapes
//!
//! - `[Project]` and `[Project, Select]` read and return a row stream
//! - `[Insert]` writes a payload
//! - `[Delete]` removes time ranges
//!
//! Anything else is answered with `NonExecutable`.

mod adapter;
mod errors;
pub mod filesystem;
mod translate;

use std::sync::Arc;

use crate::metadata::StorageEngineMeta;

pub use adapter::{check_shape, PhysicalTask, StorageAdapter, TaskExecuteResult, MAX_TIMESTAMP};
pub use errors::{PhysicalError, PhysicalResult};
pub use filesystem::FileSystemAdapter;
pub use translate::{PathTranslator, LOGICAL_SEPARATOR};

/// Builds the adapter for an engine according to its kind
pub fn open_adapter(
    engine: &StorageEngineMeta,
    insert_batch_size: usize,
) -> PhysicalResult<Arc<dyn StorageAdapter>> {
    match engine.kind.as_str() {
        filesystem::KIND => Ok(Arc::new(FileSystemAdapter::new(
            engine.clone(),
            insert_batch_size,
        )?)),
        other => Err(PhysicalError::Initialization(format!(
            "unsupported storage engine kind '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_adapter_by_kind() {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngineMeta::new(7, "filesystem")
            .with_param("dir", dir.path().to_string_lossy());
        let adapter = open_adapter(&engine, 100).unwrap();
        assert_eq!(adapter.engine().id, 7);
        assert_eq!(adapter.max_timestamp(), MAX_TIMESTAMP);

        let err = open_adapter(&StorageEngineMeta::new(8, "postgresql"), 100).err().unwrap();
        assert_eq!(err.code(), "POLY_PHYSICAL_INITIALIZATION");
    }
}
