//! Training: grid-search every candidate, keep the best, persist if good enough

use std::path::PathBuf;

use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::transformation::load_transformer;
use crate::artifact::{TrainerArtifact, TransformationArtifact};
use crate::config::{CandidateConfig, PipelineConfig};
use crate::error::{StageContext, StageName};
use crate::frame;
use crate::model::{CostModel, GridSearch, HyperParams, ModelFamily, SearchOutcome};
use crate::{Error, Result};

const STAGE: StageName = StageName::Training;

/// Settings for [`ModelTrainer`]
#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    /// Candidates in declared order
    pub candidates: IndexMap<String, CandidateConfig>,
    /// Cross-validation folds
    pub cv_folds: usize,
    /// Minimum test R² for the winner to be persisted
    pub base_model_score: f64,
    /// Where the composite model is written
    pub trained_model_path: PathBuf,
}

impl ModelTrainerConfig {
    /// Derive the stage config from the run config
    #[must_use]
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            candidates: config.model.train_model.clone(),
            cv_folds: config.model.cv_folds,
            base_model_score: config.model.base_model_score,
            trained_model_path: config.layout.trained_model(),
        }
    }
}

/// Score of one searched candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Candidate identifier
    pub name: String,
    /// Winning hyperparameters
    pub params: HyperParams,
    /// Mean cross-validation R²
    pub cv_score: f64,
    /// Test-split R² (the ranking score)
    pub test_score: f64,
}

/// Everything the trainer decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Candidates in declared order
    pub candidates: Vec<CandidateScore>,
    /// Index of the winner in `candidates`
    pub best_index: usize,
    /// Whether the winner reached the score floor and was persisted
    pub persisted: bool,
}

impl TrainingReport {
    /// Winning candidate
    #[must_use]
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }
}

/// Index of the highest score; the earliest wins ties and NaN never wins
#[must_use]
pub fn best_model_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i).or(if scores.is_empty() { None } else { Some(0) })
}

/// Training stage
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    /// Create the stage
    #[must_use]
    pub const fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    /// Grid-search every configured candidate, in declared order
    ///
    /// # Errors
    /// Returns error on an unknown candidate identifier or a fitting failure
    pub fn get_trained_models(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<Vec<SearchOutcome>> {
        let run = || -> Result<Vec<SearchOutcome>> {
            let (x_train, y_train) = frame::split_target(train)?;
            let (x_test, y_test) = frame::split_target(test)?;

            let mut outcomes = Vec::with_capacity(self.config.candidates.len());
            for (name, candidate) in &self.config.candidates {
                let family: ModelFamily = name.parse()?;
                let search = GridSearch::new(family, candidate.search_param_grid.clone(), self.config.cv_folds);
                let outcome = search.run(name, &x_train, &y_train, &x_test, &y_test)?;
                info!(
                    candidate = %name,
                    params = ?outcome.params,
                    cv_r2 = outcome.cv_score,
                    test_r2 = outcome.test_score,
                    "candidate tuned"
                );
                outcomes.push(outcome);
            }
            Ok(outcomes)
        };
        run().in_stage(STAGE, "get_trained_models")
    }

    /// Run the stage, also returning every candidate's score
    ///
    /// # Errors
    /// Returns error if an input cannot be read, a candidate fails to fit,
    /// or the model cannot be written
    #[instrument(skip_all, fields(stage = %STAGE))]
    pub fn run(&self, transformation: &TransformationArtifact) -> Result<(TrainerArtifact, TrainingReport)> {
        let op = "initiate_model_trainer";
        let train = frame::load_parquet(transformation.transformed_train_path())
            .and_then(|b| frame::to_matrix(&b))
            .in_stage(STAGE, op)?;
        let test = frame::load_parquet(transformation.transformed_test_path())
            .and_then(|b| frame::to_matrix(&b))
            .in_stage(STAGE, op)?;

        let mut outcomes = self.get_trained_models(&train, &test)?;
        let scores: Vec<f64> = outcomes.iter().map(|o| o.test_score).collect();
        let best_index = best_model_index(&scores)
            .ok_or_else(|| Error::Config("train_model lists no candidates".to_string()))
            .in_stage(STAGE, "get_best_model")?;

        let candidates: Vec<CandidateScore> = outcomes
            .iter()
            .map(|o| CandidateScore {
                name: o.name.clone(),
                params: o.params.clone(),
                cv_score: o.cv_score,
                test_score: o.test_score,
            })
            .collect();
        let best = outcomes.swap_remove(best_index);
        let persisted = best.test_score >= self.config.base_model_score;

        let model_path = if persisted {
            let transformer = load_transformer(transformation.transformer_object_path())
                .in_stage(STAGE, "load_transformer_object")?;
            CostModel::new(best.name.clone(), transformer, best.model)
                .save(&self.config.trained_model_path)
                .in_stage(STAGE, "save_model")?;
            info!(
                model = %best.name,
                score = best.test_score,
                path = %self.config.trained_model_path.display(),
                "best model persisted"
            );
            Some(self.config.trained_model_path.clone())
        } else {
            warn!(
                model = %best.name,
                score = best.test_score,
                floor = self.config.base_model_score,
                "best model is below base_model_score, nothing persisted"
            );
            None
        };

        Ok((
            TrainerArtifact::new(model_path, best.name, best.test_score),
            TrainingReport {
                candidates,
                best_index,
                persisted,
            },
        ))
    }

    /// Run the stage
    ///
    /// # Errors
    /// Returns error if an input cannot be read, a candidate fails to fit,
    /// or the model cannot be written
    pub fn initiate_model_trainer(&self, transformation: &TransformationArtifact) -> Result<TrainerArtifact> {
        Ok(self.run(transformation)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::ColumnTransformer;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn candidates(yaml: &str) -> IndexMap<String, CandidateConfig> {
        serde_yaml::from_str(yaml).unwrap()
    }

    /// Transformed arrays for y = 3x + 1, plus a matching transformer on "Weight"
    fn setup(dir: &std::path::Path) -> TransformationArtifact {
        let artifact = TransformationArtifact::new(
            dir.join("transformer.json"),
            dir.join("train.parquet"),
            dir.join("test.parquet"),
        );
        let names = vec!["f0".to_string(), "Cost".to_string()];
        let xs: Vec<f64> = (0..30).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x + 1.0).collect();
        frame::save_parquet(
            artifact.transformed_train_path(),
            &frame::float_batch(&names, vec![xs.clone(), ys.clone()]).unwrap(),
        )
        .unwrap();
        frame::save_parquet(
            artifact.transformed_test_path(),
            &frame::float_batch(&names, vec![xs[..10].to_vec(), ys[..10].to_vec()]).unwrap(),
        )
        .unwrap();

        let schema = Schema::new(vec![Field::new("Weight", DataType::Float64, false)]);
        let raw = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(Float64Array::from(xs))]).unwrap();
        let fitted = ColumnTransformer::new(vec![], vec![], vec!["Weight".to_string()])
            .fit(&raw)
            .unwrap();
        std::fs::write(artifact.transformer_object_path(), serde_json::to_vec(&fitted).unwrap()).unwrap();
        artifact
    }

    fn trainer(dir: &std::path::Path, floor: f64, yaml: &str) -> ModelTrainer {
        ModelTrainer::new(ModelTrainerConfig {
            candidates: candidates(yaml),
            cv_folds: 3,
            base_model_score: floor,
            trained_model_path: dir.join("model_trainer").join("model.json"),
        })
    }

    const CANDIDATES: &str = r"
k_neighbors:
  search_param_grid:
    n_neighbors: [3, 5]
linear_regression:
  search_param_grid:
    alpha: [0.0]
";

    #[test]
    fn test_best_model_index_ties_and_nan() {
        assert_eq!(best_model_index(&[0.5, 0.9, 0.9]), Some(1));
        assert_eq!(best_model_index(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(best_model_index(&[f64::NAN]), Some(0));
        assert_eq!(best_model_index(&[]), None);
    }

    #[test]
    fn test_linear_wins_and_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let transformation = setup(dir.path());
        let (artifact, report) = trainer(dir.path(), 0.5, CANDIDATES).run(&transformation).unwrap();

        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.best().name, "linear_regression");
        assert!(report.persisted);
        let path = artifact.trained_model_path().unwrap();
        assert!(path.exists());
        assert_eq!(CostModel::load(path).unwrap().name(), "linear_regression");
    }

    #[test]
    fn test_below_floor_produces_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let transformation = setup(dir.path());
        let artifact = trainer(dir.path(), 1.5, CANDIDATES)
            .initiate_model_trainer(&transformation)
            .unwrap();

        assert!(artifact.trained_model_path().is_none());
        assert!(!dir.path().join("model_trainer").join("model.json").exists());
        assert_eq!(artifact.best_model_name(), "linear_regression");
    }

    #[test]
    fn test_unknown_candidate_fails_in_stage() {
        let dir = tempfile::tempdir().unwrap();
        let transformation = setup(dir.path());
        let err = trainer(dir.path(), 0.5, "xgboost: {}\n")
            .run(&transformation)
            .unwrap_err();
        assert_eq!(err.stage(), Some(StageName::Training));
        assert!(matches!(err.root_cause(), Error::Config(_)));
    }
}
