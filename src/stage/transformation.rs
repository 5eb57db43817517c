//! Transformation: outlier capping, encoding, scaling
//!
//! Continuous columns are chosen on the train partition, but each partition
//! is capped with its own quartiles. The encoder is fit on train features
//! only. The target passes through untouched and is appended as the last
//! column of both persisted arrays.

use std::fs;
use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::artifact::{IngestionArtifact, TransformationArtifact};
use crate::config::PipelineConfig;
use crate::error::{StageContext, StageName};
use crate::frame;
use crate::preprocessing::{cap_outliers, continuous_columns, ColumnTransformer, FittedColumnTransformer};
use crate::Result;

const STAGE: StageName = StageName::Transformation;

/// Settings for [`DataTransformation`]
#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    /// Numeric feature columns (scaled, capping candidates)
    pub numerical_columns: Vec<String>,
    /// One-hot encoded columns
    pub onehot_columns: Vec<String>,
    /// Binary encoded columns
    pub binary_columns: Vec<String>,
    /// Regression target
    pub target_column: String,
    /// Fitted transformer output
    pub transformer_object_path: PathBuf,
    /// Transformed train array output
    pub transformed_train_path: PathBuf,
    /// Transformed test array output
    pub transformed_test_path: PathBuf,
}

impl DataTransformationConfig {
    /// Derive the stage config from the run config
    #[must_use]
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        let schema = &config.schema;
        Self {
            numerical_columns: schema.numerical_columns.clone(),
            onehot_columns: schema.onehot_columns.clone(),
            binary_columns: schema.binary_columns.clone(),
            target_column: schema.target_column.clone(),
            transformer_object_path: config.layout.transformer_object(),
            transformed_train_path: config.layout.transformed_train(),
            transformed_test_path: config.layout.transformed_test(),
        }
    }
}

/// Transformation stage
#[derive(Debug, Clone)]
pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    /// Create the stage
    #[must_use]
    pub const fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    /// Unfitted composite encoder for the configured column groups
    #[must_use]
    pub fn get_data_transformer_object(&self) -> ColumnTransformer {
        ColumnTransformer::new(
            self.config.onehot_columns.clone(),
            self.config.binary_columns.clone(),
            self.config.numerical_columns.clone(),
        )
    }

    fn split_target(&self, batch: &RecordBatch) -> Result<(RecordBatch, Vec<f64>)> {
        let target = frame::numeric_column(batch, &self.config.target_column)?;
        let features = frame::drop_columns(batch, std::slice::from_ref(&self.config.target_column))?;
        Ok((features, target))
    }

    fn persist_array(&self, path: &PathBuf, features: &Array2<f64>, target: Vec<f64>) -> Result<()> {
        let mut names: Vec<String> = (0..features.ncols()).map(|i| format!("f{i}")).collect();
        names.push(self.config.target_column.clone());

        let mut columns: Vec<Vec<f64>> = features.columns().into_iter().map(|c| c.to_vec()).collect();
        columns.push(target);

        frame::save_parquet(path, &frame::float_batch(&names, columns)?)
    }

    fn persist_transformer(&self, fitted: &FittedColumnTransformer) -> Result<()> {
        let path = &self.config.transformer_object_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec(fitted)?)?;
        Ok(())
    }

    /// Run the stage
    ///
    /// # Errors
    /// Returns error if a partition cannot be read, a declared column is
    /// missing or non-numeric, or an output cannot be written
    #[instrument(skip_all, fields(stage = %STAGE))]
    pub fn initiate_data_transformation(
        &self,
        ingestion: &IngestionArtifact,
    ) -> Result<TransformationArtifact> {
        let op = "initiate_data_transformation";
        let train = frame::load_csv(ingestion.train_path()).in_stage(STAGE, op)?;
        let test = frame::load_csv(ingestion.test_path()).in_stage(STAGE, op)?;

        let continuous = continuous_columns(&train, &self.config.numerical_columns)
            .in_stage(STAGE, "continuous_columns")?;
        debug!(?continuous, "continuous columns selected on train");

        let train = cap_outliers(&train, &continuous).in_stage(STAGE, "outlier_capping")?;
        let test = cap_outliers(&test, &continuous).in_stage(STAGE, "outlier_capping")?;

        let (train_x, train_y) = self.split_target(&train).in_stage(STAGE, op)?;
        let (test_x, test_y) = self.split_target(&test).in_stage(STAGE, op)?;

        let (fitted, train_arr) = self
            .get_data_transformer_object()
            .fit_transform(&train_x)
            .in_stage(STAGE, "fit_transform")?;
        let test_arr = fitted.transform(&test_x).in_stage(STAGE, "transform")?;
        info!(
            train_rows = train_arr.nrows(),
            test_rows = test_arr.nrows(),
            features = fitted.n_features_out(),
            capped = continuous.len(),
            "transformed partitions"
        );

        self.persist_array(&self.config.transformed_train_path, &train_arr, train_y)
            .in_stage(STAGE, "save_transformed_train")?;
        self.persist_array(&self.config.transformed_test_path, &test_arr, test_y)
            .in_stage(STAGE, "save_transformed_test")?;
        self.persist_transformer(&fitted)
            .in_stage(STAGE, "save_transformer_object")?;

        Ok(TransformationArtifact::new(
            self.config.transformer_object_path.clone(),
            self.config.transformed_train_path.clone(),
            self.config.transformed_test_path.clone(),
        ))
    }
}

/// Read a transformer persisted by [`DataTransformation`]
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn load_transformer(path: impl AsRef<std::path::Path>) -> Result<FittedColumnTransformer> {
    Ok(serde_json::from_slice(&fs::read(path.as_ref())?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::preprocessing::outlier::iqr_bounds;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn partition(n: usize, outlier: bool) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Weight", DataType::Float64, false),
            Field::new("Transport", DataType::Utf8, false),
            Field::new("Cost", DataType::Float64, false),
        ]);
        let mut weight: Vec<f64> = (0..n).map(|i| i as f64).collect();
        if outlier {
            weight[0] = 10_000.0;
        }
        let transport: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "Air" } else { "Road" }).collect();
        let cost: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Float64Array::from(weight)),
                Arc::new(StringArray::from(transport)),
                Arc::new(Float64Array::from(cost)),
            ],
        )
        .unwrap()
    }

    fn setup(dir: &std::path::Path) -> (DataTransformation, IngestionArtifact) {
        let ingestion = IngestionArtifact::new(dir.join("train.csv"), dir.join("test.csv"));
        frame::save_csv(ingestion.train_path(), &partition(40, true)).unwrap();
        frame::save_csv(ingestion.test_path(), &partition(10, false)).unwrap();

        let stage = DataTransformation::new(DataTransformationConfig {
            numerical_columns: vec!["Weight".to_string()],
            onehot_columns: vec!["Transport".to_string()],
            binary_columns: vec![],
            target_column: "Cost".to_string(),
            transformer_object_path: dir.join("out").join("transformer.json"),
            transformed_train_path: dir.join("out").join("train.parquet"),
            transformed_test_path: dir.join("out").join("test.parquet"),
        });
        (stage, ingestion)
    }

    #[test]
    fn test_outputs_have_target_last_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, ingestion) = setup(dir.path());
        let artifact = stage.initiate_data_transformation(&ingestion).unwrap();

        let train = frame::to_matrix(&frame::load_parquet(artifact.transformed_train_path()).unwrap()).unwrap();
        let test = frame::to_matrix(&frame::load_parquet(artifact.transformed_test_path()).unwrap()).unwrap();

        // 2 one-hot columns + 1 scaled column + target
        assert_eq!(train.dim(), (40, 4));
        assert_eq!(test.dim(), (10, 4));
        let (_, y) = frame::split_target(&train).unwrap();
        assert_eq!(y[5], 105.0);
    }

    #[test]
    fn test_outlier_is_capped_before_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, ingestion) = setup(dir.path());
        let artifact = stage.initiate_data_transformation(&ingestion).unwrap();

        let train = frame::to_matrix(&frame::load_parquet(artifact.transformed_train_path()).unwrap()).unwrap();
        let scaled = train.column(2);
        let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // An uncapped 10_000 among 1..39 would sit more than 6 std above the mean
        assert!(max < 4.0);
    }

    #[test]
    fn test_each_partition_is_capped_with_its_own_quartiles() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, ingestion) = setup(dir.path());
        let test_partition = partition(10, true);
        frame::save_csv(ingestion.test_path(), &test_partition).unwrap();

        let train_raw = frame::numeric_column(&partition(40, true), "Weight").unwrap();
        let test_raw = frame::numeric_column(&test_partition, "Weight").unwrap();
        let (_, train_upper) = iqr_bounds(&train_raw);
        let (_, test_upper) = iqr_bounds(&test_raw);
        assert!((train_upper - test_upper).abs() > 1.0);

        let artifact = stage.initiate_data_transformation(&ingestion).unwrap();
        let test = frame::to_matrix(&frame::load_parquet(artifact.transformed_test_path()).unwrap()).unwrap();
        let scaled = test.column(2);

        // Rows 1 and 5 are inliers (raw 1.0 and 5.0); undo the affine scaling with them
        let std = 4.0 / (scaled[5] - scaled[1]);
        let capped_outlier = 1.0 + (scaled[0] - scaled[1]) * std;
        assert!((capped_outlier - test_upper).abs() < 1e-6);
    }

    #[test]
    fn test_transformer_is_persisted_and_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, ingestion) = setup(dir.path());
        let artifact = stage.initiate_data_transformation(&ingestion).unwrap();

        let fitted = load_transformer(artifact.transformer_object_path()).unwrap();
        assert_eq!(fitted.n_features_out(), 3);
    }

    #[test]
    fn test_missing_target_fails_in_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (mut stage, ingestion) = setup(dir.path());
        stage.config.target_column = "Price".to_string();
        let err = stage.initiate_data_transformation(&ingestion).unwrap_err();
        assert_eq!(err.stage(), Some(StageName::Transformation));
        assert!(matches!(err.root_cause(), Error::MissingColumn(_)));
    }
}
