//! Error types for the Salesflow pipeline
//!
//! Every variant is a step-level failure. Row-level problems found while
//! normalizing are not errors; see `TransformWarning` in the etl crate.

use thiserror::Error;

/// Boxed underlying cause carried by extraction failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum EtlError {
    /// A source adapter could not produce its raw artifact
    #[error("Extraction failed for source '{source_name}': {cause}")]
    Extraction {
        source_name: String,
        #[source]
        cause: BoxError,
    },

    /// A raw artifact could not be read or parsed as a whole
    #[error("Transform failed for source '{source_name}': {message}")]
    Transform {
        source_name: String,
        message: String,
    },

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl EtlError {
    /// Build an extraction error from any underlying cause
    pub fn extraction(
        source_name: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        EtlError::Extraction {
            source_name: source_name.into(),
            cause: cause.into(),
        }
    }

    pub fn transform(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Transform {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// The merge failure raised when there is nothing to merge
    pub fn no_data_to_merge() -> Self {
        EtlError::Merge("no data to merge".to_string())
    }

    /// Short name of the error class, used in log fields and alerts
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Extraction { .. } => "ExtractionError",
            EtlError::Transform { .. } => "TransformError",
            EtlError::Merge(_) => "MergeError",
            EtlError::Archive(_) => "ArchiveError",
            EtlError::Report(_) => "ReportError",
            EtlError::Config(_) => "ConfigError",
            EtlError::Io(_) | EtlError::Unexpected(_) => "UnexpectedError",
        }
    }
}
