//! Stage artifacts - immutable records threaded through the pipeline
//!
//! ```text
//! IngestionArtifact ──┬─> ValidationArtifact
//!                     ├─> TransformationArtifact ──> TrainerArtifact ──┐
//!                     └──────────────────────────────────────────────> EvaluationArtifact ──> PushArtifact
//! ```
//!
//! Fields are private and only readable through getters, so an artifact can
//! never be updated in place once a stage has produced it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output of the ingestion stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    train_path: PathBuf,
    test_path: PathBuf,
}

impl IngestionArtifact {
    /// Create a new ingestion artifact
    #[must_use]
    pub fn new(train_path: impl Into<PathBuf>, test_path: impl Into<PathBuf>) -> Self {
        Self {
            train_path: train_path.into(),
            test_path: test_path.into(),
        }
    }

    /// Train partition CSV
    #[must_use]
    pub fn train_path(&self) -> &Path {
        &self.train_path
    }

    /// Test partition CSV
    #[must_use]
    pub fn test_path(&self) -> &Path {
        &self.test_path
    }
}

/// Output of the validation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    drift_report_path: PathBuf,
    validation_status: bool,
}

impl ValidationArtifact {
    /// Create a new validation artifact
    #[must_use]
    pub fn new(drift_report_path: impl Into<PathBuf>, validation_status: bool) -> Self {
        Self {
            drift_report_path: drift_report_path.into(),
            validation_status,
        }
    }

    /// Persisted drift report
    #[must_use]
    pub fn drift_report_path(&self) -> &Path {
        &self.drift_report_path
    }

    /// Recorded validation status
    #[must_use]
    pub const fn validation_status(&self) -> bool {
        self.validation_status
    }
}

/// Output of the transformation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    transformer_object_path: PathBuf,
    transformed_train_path: PathBuf,
    transformed_test_path: PathBuf,
}

impl TransformationArtifact {
    /// Create a new transformation artifact
    #[must_use]
    pub fn new(
        transformer_object_path: impl Into<PathBuf>,
        transformed_train_path: impl Into<PathBuf>,
        transformed_test_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transformer_object_path: transformer_object_path.into(),
            transformed_train_path: transformed_train_path.into(),
            transformed_test_path: transformed_test_path.into(),
        }
    }

    /// Fitted column transformer (JSON)
    #[must_use]
    pub fn transformer_object_path(&self) -> &Path {
        &self.transformer_object_path
    }

    /// Transformed train array (Parquet, target last)
    #[must_use]
    pub fn transformed_train_path(&self) -> &Path {
        &self.transformed_train_path
    }

    /// Transformed test array (Parquet, target last)
    #[must_use]
    pub fn transformed_test_path(&self) -> &Path {
        &self.transformed_test_path
    }
}

/// Output of the training stage
///
/// `trained_model_path` is `None` when no candidate reached the score floor;
/// callers must treat that as "no model produced", never as a stale path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerArtifact {
    trained_model_path: Option<PathBuf>,
    best_model_name: String,
    best_model_score: f64,
}

impl TrainerArtifact {
    /// Create a new trainer artifact
    #[must_use]
    pub fn new(
        trained_model_path: Option<PathBuf>,
        best_model_name: impl Into<String>,
        best_model_score: f64,
    ) -> Self {
        Self {
            trained_model_path,
            best_model_name: best_model_name.into(),
            best_model_score,
        }
    }

    /// Persisted composite model, if one was produced
    #[must_use]
    pub fn trained_model_path(&self) -> Option<&Path> {
        self.trained_model_path.as_deref()
    }

    /// Identifier of the winning candidate
    #[must_use]
    pub fn best_model_name(&self) -> &str {
        &self.best_model_name
    }

    /// Validation score of the winning candidate
    #[must_use]
    pub const fn best_model_score(&self) -> f64 {
        self.best_model_score
    }
}

/// Scores computed by the evaluation stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    trained_score: f64,
    incumbent_score: Option<f64>,
    accepted: bool,
    score_delta: f64,
}

impl EvaluationResult {
    /// Create a new evaluation result
    #[must_use]
    pub const fn new(
        trained_score: f64,
        incumbent_score: Option<f64>,
        accepted: bool,
        score_delta: f64,
    ) -> Self {
        Self {
            trained_score,
            incumbent_score,
            accepted,
            score_delta,
        }
    }

    /// R² of the newly trained model on the held-out test set
    #[must_use]
    pub const fn trained_score(&self) -> f64 {
        self.trained_score
    }

    /// R² of the incumbent, `None` when no incumbent exists
    #[must_use]
    pub const fn incumbent_score(&self) -> Option<f64> {
        self.incumbent_score
    }

    /// Acceptance decision
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.accepted
    }

    /// `trained_score - incumbent_score` (incumbent absent counts as 0)
    #[must_use]
    pub const fn score_delta(&self) -> f64 {
        self.score_delta
    }
}

/// Output of the evaluation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationArtifact {
    accepted: bool,
    trained_model_path: PathBuf,
    score_delta: f64,
}

impl EvaluationArtifact {
    /// Create a new evaluation artifact
    #[must_use]
    pub fn new(accepted: bool, trained_model_path: impl Into<PathBuf>, score_delta: f64) -> Self {
        Self {
            accepted,
            trained_model_path: trained_model_path.into(),
            score_delta,
        }
    }

    /// Acceptance decision
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.accepted
    }

    /// Model that was evaluated
    #[must_use]
    pub fn trained_model_path(&self) -> &Path {
        &self.trained_model_path
    }

    /// Score change against the incumbent
    #[must_use]
    pub const fn score_delta(&self) -> f64 {
        self.score_delta
    }
}

/// Output of the promotion stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushArtifact {
    bucket_name: String,
    remote_key: String,
}

impl PushArtifact {
    /// Create a new push artifact
    #[must_use]
    pub fn new(bucket_name: impl Into<String>, remote_key: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            remote_key: remote_key.into(),
        }
    }

    /// Destination bucket
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Destination key
    #[must_use]
    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }
}
