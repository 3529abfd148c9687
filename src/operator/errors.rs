//! # Operator Errors

use thiserror::Error;

use crate::data::DataType;

use super::function::MappingType;

/// Result type for operator construction and application
pub type OperatorResult<T> = Result<T, OperatorError>;

/// Operator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    #[error("Function '{name}' has mapping type {mapping}, row transform requires row mapping")]
    NotRowMapping { name: String, mapping: MappingType },

    #[error("Function not found: {0}")]
    UnknownFunction(String),

    #[error("Function already registered: {0}")]
    FunctionExists(String),

    #[error("Function '{name}' failed: {message}")]
    FunctionFailed { name: String, message: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Type mismatch on '{path}': declared {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: DataType,
        found: DataType,
    },

    #[error("Invalid path pattern: {0}")]
    InvalidPattern(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OperatorError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            OperatorError::NotRowMapping { .. } => "POLY_OPERATOR_NOT_ROW_MAPPING",
            OperatorError::UnknownFunction(_) => "POLY_OPERATOR_UNKNOWN_FUNCTION",
            OperatorError::FunctionExists(_) => "POLY_OPERATOR_FUNCTION_EXISTS",
            OperatorError::FunctionFailed { .. } => "POLY_OPERATOR_FUNCTION_FAILED",
            OperatorError::ShapeMismatch(_) => "POLY_OPERATOR_SHAPE_MISMATCH",
            OperatorError::TypeMismatch { .. } => "POLY_OPERATOR_TYPE_MISMATCH",
            OperatorError::InvalidPattern(_) => "POLY_OPERATOR_INVALID_PATTERN",
            OperatorError::Internal(_) => "POLY_OPERATOR_INTERNAL",
        }
    }
}
