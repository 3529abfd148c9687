//! Physical execution error types
//!
//! Error codes:
//! - POLY_PHYSICAL_INITIALIZATION (adapter could not start)
//! - POLY_PHYSICAL_NON_EXECUTABLE (task shape not supported)
//! - POLY_PHYSICAL_EXECUTE_FAILURE (backend rejected the operation)
//! - POLY_PHYSICAL_INVALID_PATH (path not translatable)
//! - POLY_PHYSICAL_DATA_CORRUPTION (checksum or framing failure, fatal)
//! - POLY_PHYSICAL_IO_ERROR

use std::io;

use thiserror::Error;

use crate::operator::OperatorError;

/// Result type for adapter operations
pub type PhysicalResult<T> = Result<T, PhysicalError>;

/// Errors raised at or below the storage adapter boundary
#[derive(Debug, Error)]
pub enum PhysicalError {
    #[error("Adapter initialization failed: {0}")]
    Initialization(String),

    #[error("Task not executable: {0}")]
    NonExecutable(String),

    #[error("Execution failed: {0}")]
    ExecuteFailure(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Data corruption in {file} at byte_offset {offset}: {reason}")]
    DataCorruption {
        file: String,
        offset: u64,
        reason: String,
    },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PhysicalError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PhysicalError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PhysicalError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            PhysicalError::Initialization(_) => "POLY_PHYSICAL_INITIALIZATION",
            PhysicalError::NonExecutable(_) => "POLY_PHYSICAL_NON_EXECUTABLE",
            PhysicalError::ExecuteFailure(_) => "POLY_PHYSICAL_EXECUTE_FAILURE",
            PhysicalError::InvalidPath { .. } => "POLY_PHYSICAL_INVALID_PATH",
            PhysicalError::DataCorruption { .. } => "POLY_PHYSICAL_DATA_CORRUPTION",
            PhysicalError::Io { .. } => "POLY_PHYSICAL_IO_ERROR",
        }
    }

    /// Corruption means the unit can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(self, PhysicalError::DataCorruption { .. })
    }
}

impl From<OperatorError> for PhysicalError {
    fn from(err: OperatorError) -> Self {
        PhysicalError::ExecuteFailure(format!("{} ({})", err, err.code()))
    }
}
