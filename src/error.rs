//! Error types for the shipment cost pipeline
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Every stage re-wraps failures with [`StageContext::in_stage`] so the error
//! that reaches the orchestrator names the stage and the operation that failed.

use std::fmt;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage names, used to tag errors and log spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StageName {
    /// Fetch, clean and split raw records
    Ingestion,
    /// Schema checks and drift detection
    Validation,
    /// Outlier capping, encoding and scaling
    Transformation,
    /// Candidate search and model selection
    Training,
    /// Comparison against the incumbent model
    Evaluation,
    /// Upload of the accepted model
    Pusher,
}

impl StageName {
    /// Stable lowercase identifier (used for directory names and logs)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Pusher => "pusher",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// Failure inside a stage, tagged with the operation that raised it
    #[error("{stage} stage failed in {operation}: {source}")]
    Stage {
        /// Stage that was running
        stage: StageName,
        /// Operation inside the stage
        operation: &'static str,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// A declared column is not present in a frame
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A partition or collection has no rows
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Storage error (CSV/Parquet/JSON artifacts on disk)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Frame shape or column type does not match what the operation needs
    #[error("Schema error: {0}")]
    Schema(String),

    /// Estimator could not be fitted or applied
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Model store failure
    #[error("Model store error: {0}")]
    Store(String),

    /// Document source failure
    #[error("Source error: {0}")]
    Source(String),

    /// Training finished without persisting a model (score floor not met)
    #[error("No trained model artifact was produced\nNo candidate reached the configured base_model_score")]
    NoTrainedModel,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Stage that raised the error, if it was tagged
    #[must_use]
    pub const fn stage(&self) -> Option<StageName> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost untagged cause
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Adds stage/operation context to a fallible result
pub trait StageContext<T> {
    /// Wrap the error (if any) with the stage and operation name
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped in [`Error::Stage`]
    fn in_stage(self, stage: StageName, operation: &'static str) -> Result<T>;
}

impl<T, E: Into<Error>> StageContext<T> for std::result::Result<T, E> {
    fn in_stage(self, stage: StageName, operation: &'static str) -> Result<T> {
        self.map_err(|e| Error::Stage {
            stage,
            operation,
            source: Box::new(e.into()),
        })
    }
}
