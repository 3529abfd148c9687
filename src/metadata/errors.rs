//! Metadata error types

use thiserror::Error;

/// Result type for metadata operations
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Metadata errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Metadata service unavailable: {0}")]
    Unavailable(String),

    #[error("No storage engine registered to place fragment for '{0}'")]
    NoStorageEngines(String),

    #[error("Invalid time interval: start {start} is after end {end}")]
    InvalidInterval { start: i64, end: i64 },

    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),
}

impl MetadataError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            MetadataError::Unavailable(_) => "POLY_METADATA_UNAVAILABLE",
            MetadataError::NoStorageEngines(_) => "POLY_METADATA_NO_STORAGE_ENGINES",
            MetadataError::InvalidInterval { .. } => "POLY_METADATA_INVALID_INTERVAL",
            MetadataError::InvalidFragment(_) => "POLY_METADATA_INVALID_FRAGMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MetadataError::Unavailable("down".into()).code(),
            "POLY_METADATA_UNAVAILABLE"
        );
        let err = MetadataError::InvalidInterval { start: 5, end: 1 };
        assert_eq!(err.code(), "POLY_METADATA_INVALID_INTERVAL");
        assert!(err.to_string().contains("start 5"));
    }
}
