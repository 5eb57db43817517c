//! Pipeline configuration
//!
//! Two YAML files drive a run:
//!
//! ```yaml
//! # config/schema.yaml
//! columns: 14
//! drop_columns: [Customer Id, Artist Name, Customer Location]
//! numerical_columns: [Height, Width, Weight]
//! categorical_columns: [Material, Transport]
//! onehot_columns: [Transport]
//! binary_columns: [Material]
//! target_column: Cost
//! ```
//!
//! ```yaml
//! # config/model.yaml
//! base_model_score: 0.6
//! cv_folds: 3
//! train_model:
//!   linear_regression:
//!     search_param_grid:
//!       alpha: [0.0, 1.0]
//! ```
//!
//! Everything else (paths, selectors, policies) lives in [`PipelineConfig`],
//! which the orchestrator splits into one immutable config per stage.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fraction of rows assigned to the test partition
pub const TEST_SIZE: f64 = 0.2;

/// Default source database name
pub const DB_NAME: &str = "shipping";

/// Default source collection name
pub const COLLECTION_NAME: &str = "shipping_data";

/// Default bucket holding the production model
pub const BUCKET_NAME: &str = "shipping-model-io-files";

/// Well-known key of the production model blob
pub const MODEL_FILE_NAME: &str = "shipping_price_model.json";

/// Declared column count, either as a number or as the full name list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnCount {
    /// Bare count
    Count(usize),
    /// Column names (only the length is used)
    Names(Vec<String>),
}

impl ColumnCount {
    /// Number of declared columns
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            Self::Names(names) => names.len(),
        }
    }

    /// True when zero columns are declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataset schema (`schema.yaml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Expected column count of the ingested partitions
    pub columns: ColumnCount,
    /// Columns removed right after fetching
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Numeric feature columns (scaled, candidates for capping)
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    /// Categorical feature columns
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    /// Categorical columns one-hot encoded
    #[serde(default)]
    pub onehot_columns: Vec<String>,
    /// Categorical columns binary encoded
    #[serde(default)]
    pub binary_columns: Vec<String>,
    /// Regression target
    pub target_column: String,
}

impl SchemaConfig {
    /// Load from a YAML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Parse from YAML text
    ///
    /// # Errors
    /// Returns error on malformed YAML or an empty target column
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let schema: Self = serde_yaml::from_str(text)?;
        if schema.target_column.trim().is_empty() {
            return Err(Error::Config("target_column must not be empty".to_string()));
        }
        Ok(schema)
    }
}

/// One candidate model family and its search grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    /// Hyperparameter name -> values to try (declared order is search order)
    #[serde(default)]
    pub search_param_grid: IndexMap<String, Vec<f64>>,
}

const fn default_cv_folds() -> usize {
    3
}

/// Model selection settings (`model.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Minimum validation score for a model to be persisted
    pub base_model_score: f64,
    /// Cross-validation folds used by the grid search
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Candidate identifiers in declared order
    pub train_model: IndexMap<String, CandidateConfig>,
}

impl ModelConfig {
    /// Load from a YAML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Parse from YAML text
    ///
    /// # Errors
    /// Returns error on malformed YAML, no candidates, or fewer than 2 folds
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        if config.train_model.is_empty() {
            return Err(Error::Config("train_model lists no candidates".to_string()));
        }
        if config.cv_folds < 2 {
            return Err(Error::Config(format!(
                "cv_folds must be at least 2, got {}",
                config.cv_folds
            )));
        }
        Ok(config)
    }

    /// Candidate identifiers in declared order
    pub fn candidate_names(&self) -> impl Iterator<Item = &str> {
        self.train_model.keys().map(String::as_str)
    }
}

/// How the evaluation stage turns scores into an acceptance decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptancePolicy {
    /// Accept every trained model (historical behaviour; the comparison is
    /// computed and reported but does not gate)
    #[default]
    AlwaysAccept,
    /// Accept only when the trained score beats the incumbent score
    StrictImprovement,
}

/// Switches for the two historical gate behaviours
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Write the computed validation decision into the artifact.
    /// `false` keeps the historical behaviour where the status is never set.
    pub record_validation_status: bool,
    /// Acceptance rule of the evaluation stage
    pub acceptance: AcceptancePolicy,
}

/// Per-run artifact directory layout
///
/// ```text
/// <root>/<MM_DD_YYYY_HH_MM_SS>/
///   data_ingestion/train/train.csv
///   data_ingestion/test/test.csv
///   data_validation/drift_report.yaml
///   data_transformation/transformed_train/train.parquet
///   data_transformation/transformed_test/test.parquet
///   data_transformation/transformer.json
///   model_trainer/shipping_price_model.json
///   run_manifest.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    run_dir: PathBuf,
}

impl ArtifactLayout {
    /// Layout rooted at `<root>/<timestamp>`
    #[must_use]
    pub fn timestamped(root: impl AsRef<Path>, at: DateTime<Local>) -> Self {
        Self {
            run_dir: root
                .as_ref()
                .join(at.format("%m_%d_%Y_%H_%M_%S").to_string()),
        }
    }

    /// Layout rooted at an explicit run directory
    #[must_use]
    pub fn at(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// Run directory
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Ingestion stage directory
    #[must_use]
    pub fn ingestion_dir(&self) -> PathBuf {
        self.run_dir.join("data_ingestion")
    }

    /// Train partition CSV
    #[must_use]
    pub fn train_csv(&self) -> PathBuf {
        self.ingestion_dir().join("train").join("train.csv")
    }

    /// Test partition CSV
    #[must_use]
    pub fn test_csv(&self) -> PathBuf {
        self.ingestion_dir().join("test").join("test.csv")
    }

    /// Validation stage directory
    #[must_use]
    pub fn validation_dir(&self) -> PathBuf {
        self.run_dir.join("data_validation")
    }

    /// Drift report file
    #[must_use]
    pub fn drift_report(&self) -> PathBuf {
        self.validation_dir().join("drift_report.yaml")
    }

    /// Transformation stage directory
    #[must_use]
    pub fn transformation_dir(&self) -> PathBuf {
        self.run_dir.join("data_transformation")
    }

    /// Transformed train array
    #[must_use]
    pub fn transformed_train(&self) -> PathBuf {
        self.transformation_dir()
            .join("transformed_train")
            .join("train.parquet")
    }

    /// Transformed test array
    #[must_use]
    pub fn transformed_test(&self) -> PathBuf {
        self.transformation_dir()
            .join("transformed_test")
            .join("test.parquet")
    }

    /// Fitted transformer object
    #[must_use]
    pub fn transformer_object(&self) -> PathBuf {
        self.transformation_dir().join("transformer.json")
    }

    /// Training stage directory
    #[must_use]
    pub fn trainer_dir(&self) -> PathBuf {
        self.run_dir.join("model_trainer")
    }

    /// Persisted composite model
    #[must_use]
    pub fn trained_model(&self) -> PathBuf {
        self.trainer_dir().join(MODEL_FILE_NAME)
    }

    /// Run manifest written by the orchestrator
    #[must_use]
    pub fn manifest(&self) -> PathBuf {
        self.run_dir.join("run_manifest.json")
    }
}

/// Everything a run needs, passed by value into the orchestrator
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Dataset schema
    pub schema: SchemaConfig,
    /// Candidate models and score floor
    pub model: ModelConfig,
    /// Artifact directory layout for this run
    pub layout: ArtifactLayout,
    /// Source database name
    pub database: String,
    /// Source collection name
    pub collection: String,
    /// Bucket holding the production model
    pub bucket: String,
    /// Key of the production model inside the bucket
    pub model_key: String,
    /// Seed for the train/test split; `None` draws fresh entropy each run
    pub split_seed: Option<u64>,
    /// Historical gate switches
    pub gates: GatePolicy,
}

impl PipelineConfig {
    /// Config with the default selectors, bucket and key
    #[must_use]
    pub fn new(schema: SchemaConfig, model: ModelConfig, layout: ArtifactLayout) -> Self {
        Self {
            schema,
            model,
            layout,
            database: DB_NAME.to_string(),
            collection: COLLECTION_NAME.to_string(),
            bucket: BUCKET_NAME.to_string(),
            model_key: MODEL_FILE_NAME.to_string(),
            split_seed: None,
            gates: GatePolicy::default(),
        }
    }

    /// Set the split seed
    #[must_use]
    pub const fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = Some(seed);
        self
    }

    /// Set the gate policy
    #[must_use]
    pub const fn with_gates(mut self, gates: GatePolicy) -> Self {
        self.gates = gates;
        self
    }

    /// Set the source selector
    #[must_use]
    pub fn with_source(mut self, database: impl Into<String>, collection: impl Into<String>) -> Self {
        self.database = database.into();
        self.collection = collection.into();
        self
    }

    /// Set the destination bucket
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }
}
