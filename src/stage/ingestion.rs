//! Ingestion: fetch, clean, split, persist

use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, instrument};

use crate::artifact::IngestionArtifact;
use crate::config::{PipelineConfig, TEST_SIZE};
use crate::error::{StageContext, StageName};
use crate::frame;
use crate::source::DocumentSource;
use crate::{Error, Result};

const STAGE: StageName = StageName::Ingestion;

/// Settings for [`DataIngestion`]
#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    /// Source database
    pub database: String,
    /// Source collection
    pub collection: String,
    /// Columns removed right after fetching
    pub drop_columns: Vec<String>,
    /// Fraction of rows sent to the test partition
    pub test_size: f64,
    /// Shuffle seed; `None` is non-reproducible
    pub seed: Option<u64>,
    /// Train partition CSV
    pub train_path: PathBuf,
    /// Test partition CSV
    pub test_path: PathBuf,
}

impl DataIngestionConfig {
    /// Derive the stage config from the run config
    #[must_use]
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            database: config.database.clone(),
            collection: config.collection.clone(),
            drop_columns: config.schema.drop_columns.clone(),
            test_size: TEST_SIZE,
            seed: config.split_seed,
            train_path: config.layout.train_csv(),
            test_path: config.layout.test_csv(),
        }
    }
}

/// Shuffle `0..n` and cut off `ceil(n * test_size)` rows for the test partition
///
/// Returns `(train, test)` index lists; together they are a permutation of `0..n`.
#[must_use]
pub fn split_indices(n: usize, test_size: f64, seed: Option<u64>) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    match seed {
        Some(seed) => indices.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => indices.shuffle(&mut rand::thread_rng()),
    }
    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(n);
    let train = indices.split_off(n_test);
    (train, indices)
}

/// Ingestion stage
#[derive(Debug, Clone)]
pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    /// Create the stage
    #[must_use]
    pub const fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    /// Fetch the configured collection without `_id`
    ///
    /// # Errors
    /// Returns error if the source cannot be read
    pub fn get_data<S: DocumentSource + ?Sized>(&self, source: &S) -> Result<RecordBatch> {
        source
            .fetch_collection(&self.config.database, &self.config.collection)
            .in_stage(STAGE, "get_data")
    }

    /// Split into train/test partitions and write both as CSV
    ///
    /// # Errors
    /// Returns error if the frame is empty or a partition cannot be written
    pub fn split_data_as_train_test(&self, batch: &RecordBatch) -> Result<(RecordBatch, RecordBatch)> {
        let run = || -> Result<(RecordBatch, RecordBatch)> {
            if batch.num_rows() == 0 {
                return Err(Error::EmptyData("no rows left after dropping nulls".to_string()));
            }
            let (train_idx, test_idx) =
                split_indices(batch.num_rows(), self.config.test_size, self.config.seed);
            let train = frame::take_rows(batch, &train_idx)?;
            let test = frame::take_rows(batch, &test_idx)?;

            frame::save_csv(&self.config.train_path, &train)?;
            frame::save_csv(&self.config.test_path, &test)?;
            Ok((train, test))
        };
        run().in_stage(STAGE, "split_data_as_train_test")
    }

    /// Run the stage
    ///
    /// # Errors
    /// Returns error if fetching, cleaning, splitting or writing fails
    #[instrument(skip_all, fields(stage = %STAGE))]
    pub fn initiate_data_ingestion<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<IngestionArtifact> {
        let raw = self.get_data(source)?;
        let fetched = raw.num_rows();

        let cleaned = frame::drop_columns(&raw, &self.config.drop_columns)
            .and_then(|b| frame::drop_null_rows(&b))
            .in_stage(STAGE, "initiate_data_ingestion")?;
        info!(
            fetched,
            kept = cleaned.num_rows(),
            dropped_columns = self.config.drop_columns.len(),
            "cleaned source frame"
        );

        let (train, test) = self.split_data_as_train_test(&cleaned)?;
        info!(
            train_rows = train.num_rows(),
            test_rows = test.num_rows(),
            seeded = self.config.seed.is_some(),
            "split into train and test"
        );

        Ok(IngestionArtifact::new(
            self.config.train_path.clone(),
            self.config.test_path.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use serde_json::json;

    fn config(dir: &std::path::Path, seed: Option<u64>) -> DataIngestionConfig {
        DataIngestionConfig {
            database: "shipping".to_string(),
            collection: "shipping_data".to_string(),
            drop_columns: vec!["Customer Id".to_string()],
            test_size: TEST_SIZE,
            seed,
            train_path: dir.join("train").join("train.csv"),
            test_path: dir.join("test").join("test.csv"),
        }
    }

    fn source(rows: usize) -> MemorySource {
        let docs = (0..rows)
            .map(|i| {
                if i == 3 {
                    json!({"_id": i, "Customer Id": "c", "Weight": null, "Cost": 1.0})
                } else {
                    json!({"_id": i, "Customer Id": "c", "Weight": i, "Cost": i as f64 * 2.0})
                }
            })
            .collect();
        MemorySource::new().with_collection("shipping", "shipping_data", docs)
    }

    #[test]
    fn test_split_indices_sizes() {
        let (train, test) = split_indices(10, 0.2, Some(1));
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let (train, test) = split_indices(11, 0.2, Some(1));
        assert_eq!((train.len(), test.len()), (8, 3));
    }

    #[test]
    fn test_split_indices_seeded_is_reproducible() {
        assert_eq!(split_indices(50, 0.2, Some(7)), split_indices(50, 0.2, Some(7)));
    }

    #[test]
    fn test_split_indices_unseeded_is_not_reproducible() {
        let draws: Vec<_> = (0..5).map(|_| split_indices(50, 0.2, None)).collect();
        for (train, test) in &draws {
            assert_eq!(test.len(), 10);
            assert_eq!(train.len(), 40);
            let mut all: Vec<usize> = train.iter().chain(test).copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..50).collect::<Vec<_>>());
        }
        // Five identical shuffles of 50 rows would be a 1 in (50!)^4 event
        assert!(draws.iter().any(|d| d != &draws[0]));
    }

    #[test]
    fn test_ingestion_writes_partitions_without_nulls_or_dropped_columns() {
        let dir = tempfile::tempdir().unwrap();
        let stage = DataIngestion::new(config(dir.path(), Some(42)));
        let artifact = stage.initiate_data_ingestion(&source(21)).unwrap();

        let train = frame::load_csv(artifact.train_path()).unwrap();
        let test = frame::load_csv(artifact.test_path()).unwrap();
        assert_eq!(train.num_rows() + test.num_rows(), 20);
        assert_eq!(test.num_rows(), 4);
        assert!(!frame::has_column(&train, "Customer Id"));
        assert!(!frame::has_column(&train, "_id"));
    }

    #[test]
    fn test_unknown_drop_column_fails_in_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), None);
        cfg.drop_columns = vec!["Nope".to_string()];
        let err = DataIngestion::new(cfg).initiate_data_ingestion(&source(5)).unwrap_err();
        assert_eq!(err.stage(), Some(StageName::Ingestion));
        assert!(matches!(err.root_cause(), Error::MissingColumn(_)));
    }

    #[test]
    fn test_missing_collection_fails_in_get_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataIngestion::new(config(dir.path(), None))
            .initiate_data_ingestion(&MemorySource::new())
            .unwrap_err();
        assert!(err.to_string().contains("get_data"));
    }
}
