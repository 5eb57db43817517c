//! Composite cost model: fitted transformer + fitted estimator
//!
//! This is the unit that gets persisted, evaluated and promoted. Raw feature
//! frames go in, cost predictions come out.

use std::fs;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use super::{metrics::r2_score, FittedModel};
use crate::preprocessing::FittedColumnTransformer;
use crate::Result;

/// Fitted preprocessing and estimator, owned together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    name: String,
    transformer: FittedColumnTransformer,
    estimator: FittedModel,
}

impl CostModel {
    /// Bundle a fitted transformer with the estimator trained on its output
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        transformer: FittedColumnTransformer,
        estimator: FittedModel,
    ) -> Self {
        Self {
            name: name.into(),
            transformer,
            estimator,
        }
    }

    /// Candidate identifier the estimator came from
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fitted transformer
    #[must_use]
    pub const fn transformer(&self) -> &FittedColumnTransformer {
        &self.transformer
    }

    /// Fitted estimator
    #[must_use]
    pub const fn estimator(&self) -> &FittedModel {
        &self.estimator
    }

    /// Predict costs for raw feature rows
    ///
    /// # Errors
    /// Returns error if `features` lacks a column the transformer was fit on
    pub fn predict(&self, features: &RecordBatch) -> Result<Vec<f64>> {
        let encoded = self.transformer.transform(features)?;
        self.estimator.predict(&encoded)
    }

    /// R² of [`Self::predict`] against `target`
    ///
    /// # Errors
    /// Returns error if prediction fails
    pub fn score(&self, features: &RecordBatch, target: &[f64]) -> Result<f64> {
        Ok(r2_score(target, &self.predict(features)?))
    }

    /// Serialize to JSON bytes
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes
    ///
    /// # Errors
    /// Returns error if the bytes are not a serialized model
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Write to `path`, creating parent directories
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path.as_ref(), self.to_bytes()?)?;
        Ok(())
    }

    /// Read from `path`
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(&fs::read(path.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HyperParams, ModelFamily};
    use crate::preprocessing::ColumnTransformer;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn features(weights: &[f64], transport: &[&str]) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Weight", DataType::Float64, false),
            Field::new("Transport", DataType::Utf8, false),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Float64Array::from(weights.to_vec())),
                Arc::new(StringArray::from(transport.to_vec())),
            ],
        )
        .unwrap()
    }

    fn fitted_model() -> (CostModel, RecordBatch) {
        let batch = features(&[1.0, 2.0, 3.0, 4.0], &["Road", "Air", "Road", "Air"]);
        let y = [10.0, 25.0, 30.0, 45.0];
        let transformer = ColumnTransformer::new(
            vec!["Transport".to_string()],
            vec![],
            vec!["Weight".to_string()],
        )
        .fit(&batch)
        .unwrap();
        let x = transformer.transform(&batch).unwrap();
        let estimator = ModelFamily::LinearRegression
            .fit(&x, &y, &HyperParams::new())
            .unwrap();
        (CostModel::new("linear_regression", transformer, estimator), batch)
    }

    #[test]
    fn test_predict_composes_transform_and_estimator() {
        let (model, batch) = fitted_model();
        let direct = model
            .estimator()
            .predict(&model.transformer().transform(&batch).unwrap())
            .unwrap();
        assert_eq!(model.predict(&batch).unwrap(), direct);
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let (model, batch) = fitted_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_trainer").join("model.json");

        model.save(&path).unwrap();
        let loaded = CostModel::load(&path).unwrap();

        assert_eq!(loaded.name(), "linear_regression");
        assert_eq!(loaded.predict(&batch).unwrap(), model.predict(&batch).unwrap());
    }

    #[test]
    fn test_missing_feature_column_is_error() {
        let (model, _) = fitted_model();
        let schema = Schema::new(vec![Field::new("Weight", DataType::Float64, false)]);
        let partial = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Float64Array::from(vec![1.0]))],
        )
        .unwrap();
        assert!(model.predict(&partial).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(CostModel::from_bytes(b"not a model").is_err());
    }
}
