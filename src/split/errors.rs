//! Split error types

use thiserror::Error;

use crate::metadata::MetadataError;

/// Result type for plan splitting
pub type SplitResult<T> = Result<T, SplitError>;

/// Split errors; any of them aborts the whole split
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("Metadata failure during split: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SplitError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SplitError::Metadata(_) => "POLY_SPLIT_METADATA",
            SplitError::InvalidPlan(_) => "POLY_SPLIT_INVALID_PLAN",
            SplitError::Internal(_) => "POLY_SPLIT_INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_error_wraps() {
        let err: SplitError = MetadataError::Unavailable("down".into()).into();
        assert_eq!(err.code(), "POLY_SPLIT_METADATA");
        assert!(err.to_string().contains("down"));
    }
}
