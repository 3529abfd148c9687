//! Coordinator error types

use thiserror::Error;

use crate::config::ConfigError;
use crate::metadata::MetadataError;
use crate::operator::OperatorError;
use crate::split::SplitError;
use crate::storage::PhysicalError;

/// Result type for coordinator requests
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Request-level errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Physical(#[from] PhysicalError),

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No adapter registered for storage engine {0}")]
    UnknownEngine(u64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Stable error code; wrapped errors keep their own
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::Split(e) => e.code(),
            CoordinatorError::Physical(e) => e.code(),
            CoordinatorError::Operator(e) => e.code(),
            CoordinatorError::Metadata(e) => e.code(),
            CoordinatorError::Config(e) => e.code(),
            CoordinatorError::UnknownEngine(_) => "POLY_COORDINATOR_UNKNOWN_ENGINE",
            CoordinatorError::InvalidRequest(_) => "POLY_COORDINATOR_INVALID_REQUEST",
            CoordinatorError::Internal(_) => "POLY_COORDINATOR_INTERNAL",
        }
    }
}
