//! Validation: schema checks and train/test drift
//!
//! The combined decision is computed and logged on every run. It is only
//! written into the artifact when `record_validation_status` is set; by
//! default the artifact keeps `validation_status = false` regardless of the
//! checks, and downstream stages never read it.

use std::fs;
use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::artifact::{IngestionArtifact, ValidationArtifact};
use crate::config::PipelineConfig;
use crate::drift::{DriftDetector, DriftReport};
use crate::error::{StageContext, StageName};
use crate::frame;
use crate::Result;

const STAGE: StageName = StageName::Validation;

/// Settings for [`DataValidation`]
#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    /// Expected column count of each partition
    pub expected_columns: usize,
    /// Declared numeric columns
    pub numerical_columns: Vec<String>,
    /// Declared categorical columns
    pub categorical_columns: Vec<String>,
    /// Where the drift report is written
    pub drift_report_path: PathBuf,
    /// Write the computed decision into the artifact
    pub record_validation_status: bool,
    /// Drift thresholds
    pub detector: DriftDetector,
}

impl DataValidationConfig {
    /// Derive the stage config from the run config
    #[must_use]
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            expected_columns: config.schema.columns.len(),
            numerical_columns: config.schema.numerical_columns.clone(),
            categorical_columns: config.schema.categorical_columns.clone(),
            drift_report_path: config.layout.drift_report(),
            record_validation_status: config.gates.record_validation_status,
            detector: DriftDetector::default(),
        }
    }
}

/// Result of [`DataValidation::detect_dataset_drift`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftOutcome {
    /// Dataset-level drift flag
    Detected(bool),
    /// Fraction of drifted features
    Ratio(f64),
}

/// Every individual check of one validation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Train column count matches the schema
    pub train_columns_ok: bool,
    /// Test column count matches the schema
    pub test_columns_ok: bool,
    /// Train has at least one declared numeric column
    pub train_numerical_ok: bool,
    /// Test has at least one declared numeric column
    pub test_numerical_ok: bool,
    /// Train has at least one declared categorical column
    pub train_categorical_ok: bool,
    /// Test has at least one declared categorical column
    pub test_categorical_ok: bool,
    /// Dataset-level drift between train and test
    pub dataset_drift: bool,
    /// Fraction of drifted features
    pub drift_share: f64,
}

impl ValidationReport {
    /// All checks pass and no dataset drift was detected
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.train_columns_ok
            && self.test_columns_ok
            && self.train_numerical_ok
            && self.test_numerical_ok
            && self.train_categorical_ok
            && self.test_categorical_ok
            && !self.dataset_drift
    }
}

/// Validation stage
#[derive(Debug, Clone)]
pub struct DataValidation {
    config: DataValidationConfig,
}

impl DataValidation {
    /// Create the stage
    #[must_use]
    pub const fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }

    /// Column count equals the schema's count; names and order are not checked
    #[must_use]
    pub fn validate_schema_columns(&self, batch: &RecordBatch) -> bool {
        batch.num_columns() == self.config.expected_columns
    }

    /// At least one declared numeric column is present
    #[must_use]
    pub fn do_numerical_columns_exist(&self, batch: &RecordBatch) -> bool {
        any_present(batch, &self.config.numerical_columns)
    }

    /// At least one declared categorical column is present
    #[must_use]
    pub fn do_categorical_columns_exist(&self, batch: &RecordBatch) -> bool {
        any_present(batch, &self.config.categorical_columns)
    }

    fn drift_report(&self, reference: &RecordBatch, production: &RecordBatch) -> Result<DriftReport> {
        let report = self.config.detector.report(reference, production)?;
        let path = &self.config.drift_report_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(&report)?)?;
        Ok(report)
    }

    /// Compare `production` against `reference` and persist the report
    ///
    /// The report file is written in both modes.
    ///
    /// # Errors
    /// Returns error if the report cannot be computed or written
    pub fn detect_dataset_drift(
        &self,
        reference: &RecordBatch,
        production: &RecordBatch,
        get_ratio: bool,
    ) -> Result<DriftOutcome> {
        let report = self
            .drift_report(reference, production)
            .in_stage(STAGE, "detect_dataset_drift")?;
        Ok(if get_ratio {
            DriftOutcome::Ratio(report.drift_ratio())
        } else {
            DriftOutcome::Detected(report.dataset_drift())
        })
    }

    /// Run the stage, also returning the individual checks
    ///
    /// # Errors
    /// Returns error if a partition cannot be read or the drift report cannot
    /// be written
    #[instrument(skip_all, fields(stage = %STAGE))]
    pub fn run(&self, ingestion: &IngestionArtifact) -> Result<(ValidationArtifact, ValidationReport)> {
        let train = frame::load_csv(ingestion.train_path()).in_stage(STAGE, "initiate_data_validation")?;
        let test = frame::load_csv(ingestion.test_path()).in_stage(STAGE, "initiate_data_validation")?;

        let drift = self
            .drift_report(&train, &test)
            .in_stage(STAGE, "detect_dataset_drift")?;

        let report = ValidationReport {
            train_columns_ok: self.validate_schema_columns(&train),
            test_columns_ok: self.validate_schema_columns(&test),
            train_numerical_ok: self.do_numerical_columns_exist(&train),
            test_numerical_ok: self.do_numerical_columns_exist(&test),
            train_categorical_ok: self.do_categorical_columns_exist(&train),
            test_categorical_ok: self.do_categorical_columns_exist(&test),
            dataset_drift: drift.dataset_drift(),
            drift_share: drift.drift_ratio(),
        };
        info!(?report, passed = report.passed(), "validation checks computed");

        let status = if self.config.record_validation_status {
            report.passed()
        } else {
            if report.passed() {
                warn!("validation passed but status is not recorded (record_validation_status = false)");
            }
            false
        };

        Ok((
            ValidationArtifact::new(self.config.drift_report_path.clone(), status),
            report,
        ))
    }

    /// Run the stage
    ///
    /// # Errors
    /// Returns error if a partition cannot be read or the drift report cannot
    /// be written
    pub fn initiate_data_validation(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact> {
        Ok(self.run(ingestion)?.0)
    }
}

fn any_present(batch: &RecordBatch, columns: &[String]) -> bool {
    columns.iter().any(|c| frame::has_column(batch, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(n: usize, step: f64, offset: f64) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Weight", DataType::Float64, false),
            Field::new("Material", DataType::Utf8, false),
            Field::new("Cost", DataType::Float64, false),
        ]);
        let weight: Vec<f64> = (0..n).map(|i| i as f64 * step + offset).collect();
        let material: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Wood" } else { "Brass" }).collect();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Float64Array::from(weight.clone())),
                Arc::new(StringArray::from(material)),
                Arc::new(Float64Array::from(weight)),
            ],
        )
        .unwrap()
    }

    fn stage(dir: &std::path::Path, columns: usize, record: bool) -> DataValidation {
        DataValidation::new(DataValidationConfig {
            expected_columns: columns,
            numerical_columns: vec!["Weight".to_string(), "Height".to_string()],
            categorical_columns: vec!["Material".to_string()],
            drift_report_path: dir.join("data_validation").join("drift_report.yaml"),
            record_validation_status: record,
            detector: DriftDetector::default(),
        })
    }

    fn ingest(dir: &std::path::Path, train: &RecordBatch, test: &RecordBatch) -> IngestionArtifact {
        let artifact = IngestionArtifact::new(dir.join("train.csv"), dir.join("test.csv"));
        frame::save_csv(artifact.train_path(), train).unwrap();
        frame::save_csv(artifact.test_path(), test).unwrap();
        artifact
    }

    #[test]
    fn test_schema_columns_is_count_only() {
        let dir = tempfile::tempdir().unwrap();
        assert!(stage(dir.path(), 3, false).validate_schema_columns(&batch(4, 1.0, 0.0)));
        assert!(!stage(dir.path(), 4, false).validate_schema_columns(&batch(4, 1.0, 0.0)));
    }

    #[test]
    fn test_any_quantifier() {
        let dir = tempfile::tempdir().unwrap();
        // "Height" is missing but "Weight" is present
        assert!(stage(dir.path(), 3, false).do_numerical_columns_exist(&batch(4, 1.0, 0.0)));
        let projected = batch(4, 1.0, 0.0).project(&[1]).unwrap();
        assert!(!stage(dir.path(), 3, false).do_numerical_columns_exist(&projected));
    }

    #[test]
    fn test_detect_drift_persists_report_in_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let s = stage(dir.path(), 3, false);
        let reference = batch(40, 1.0, 0.0);
        let shifted = batch(40, 1.0, 1000.0);

        let flag = s.detect_dataset_drift(&reference, &shifted, false).unwrap();
        assert_eq!(flag, DriftOutcome::Detected(true));
        assert!(dir.path().join("data_validation/drift_report.yaml").exists());

        let DriftOutcome::Ratio(ratio) = s.detect_dataset_drift(&reference, &shifted, true).unwrap() else {
            panic!("expected a ratio");
        };
        assert!((ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_status_not_recorded_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = ingest(dir.path(), &batch(40, 1.0, 0.0), &batch(10, 4.0, 1.5));

        let (artifact, report) = stage(dir.path(), 3, false).run(&ingestion).unwrap();
        assert!(report.passed());
        assert!(!artifact.validation_status());
        assert!(artifact.drift_report_path().exists());
    }

    #[test]
    fn test_status_recorded_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = ingest(dir.path(), &batch(40, 1.0, 0.0), &batch(10, 4.0, 1.5));

        let passing = stage(dir.path(), 3, true).initiate_data_validation(&ingestion).unwrap();
        assert!(passing.validation_status());

        let failing = stage(dir.path(), 5, true).initiate_data_validation(&ingestion).unwrap();
        assert!(!failing.validation_status());
    }
}
