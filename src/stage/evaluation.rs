//! Evaluation: score the new model against the production model
//!
//! Both models are scored with R² on the raw test partition. With the
//! default [`AcceptancePolicy::AlwaysAccept`] the comparison is computed and
//! reported but every trained model is accepted.

use tracing::{info, instrument};

use crate::artifact::{EvaluationArtifact, EvaluationResult, IngestionArtifact, TrainerArtifact};
use crate::config::{AcceptancePolicy, PipelineConfig};
use crate::error::{StageContext, StageName};
use crate::frame;
use crate::model::CostModel;
use crate::store::{load_model, ModelStore};
use crate::{Error, Result};

const STAGE: StageName = StageName::Evaluation;

/// Settings for [`ModelEvaluation`]
#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    /// Bucket holding the production model
    pub bucket: String,
    /// Key of the production model
    pub model_key: String,
    /// Regression target in the raw test partition
    pub target_column: String,
    /// Acceptance rule
    pub acceptance: AcceptancePolicy,
}

impl ModelEvaluationConfig {
    /// Derive the stage config from the run config
    #[must_use]
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            model_key: config.model_key.clone(),
            target_column: config.schema.target_column.clone(),
            acceptance: config.gates.acceptance,
        }
    }
}

/// Acceptance decision for a score change
#[must_use]
pub fn is_accepted(policy: AcceptancePolicy, score_delta: f64) -> bool {
    match policy {
        AcceptancePolicy::AlwaysAccept => true,
        AcceptancePolicy::StrictImprovement => score_delta > 0.0,
    }
}

/// Evaluation stage
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
}

impl ModelEvaluation {
    /// Create the stage
    #[must_use]
    pub const fn new(config: ModelEvaluationConfig) -> Self {
        Self { config }
    }

    /// Production model, if one is stored under the configured key
    ///
    /// # Errors
    /// Returns error if the store cannot be read or the blob is not a model
    pub fn get_incumbent_model<S: ModelStore + ?Sized>(&self, store: &S) -> Result<Option<CostModel>> {
        load_model(store, &self.config.bucket, &self.config.model_key).in_stage(STAGE, "get_incumbent_model")
    }

    /// Score the trained and incumbent models on the test partition
    ///
    /// # Errors
    /// Returns [`Error::NoTrainedModel`] if the trainer persisted nothing, or
    /// an error if a model or the test partition cannot be read or scored
    pub fn evaluate_model<S: ModelStore + ?Sized>(
        &self,
        ingestion: &IngestionArtifact,
        trainer: &TrainerArtifact,
        store: &S,
    ) -> Result<EvaluationResult> {
        let op = "evaluate_model";
        let model_path = trainer.trained_model_path().ok_or(Error::NoTrainedModel).in_stage(STAGE, op)?;

        let test = frame::load_csv(ingestion.test_path()).in_stage(STAGE, op)?;
        let target = frame::numeric_column(&test, &self.config.target_column).in_stage(STAGE, op)?;
        let features = frame::drop_columns(&test, std::slice::from_ref(&self.config.target_column))
            .in_stage(STAGE, op)?;

        let trained = CostModel::load(model_path).in_stage(STAGE, op)?;
        let trained_score = trained.score(&features, &target).in_stage(STAGE, op)?;

        let incumbent_score = match self.get_incumbent_model(store)? {
            Some(incumbent) => Some(incumbent.score(&features, &target).in_stage(STAGE, op)?),
            None => None,
        };

        let score_delta = trained_score - incumbent_score.unwrap_or(0.0);
        let accepted = is_accepted(self.config.acceptance, score_delta);
        info!(
            trained_r2 = trained_score,
            incumbent_r2 = ?incumbent_score,
            score_delta,
            accepted,
            policy = ?self.config.acceptance,
            "evaluated trained model"
        );
        Ok(EvaluationResult::new(trained_score, incumbent_score, accepted, score_delta))
    }

    /// Run the stage, also returning the scores
    ///
    /// # Errors
    /// See [`Self::evaluate_model`]
    #[instrument(skip_all, fields(stage = %STAGE))]
    pub fn run<S: ModelStore + ?Sized>(
        &self,
        ingestion: &IngestionArtifact,
        trainer: &TrainerArtifact,
        store: &S,
    ) -> Result<(EvaluationArtifact, EvaluationResult)> {
        let result = self.evaluate_model(ingestion, trainer, store)?;
        let model_path = trainer
            .trained_model_path()
            .ok_or(Error::NoTrainedModel)
            .in_stage(STAGE, "initiate_model_evaluation")?;
        Ok((
            EvaluationArtifact::new(result.accepted(), model_path, result.score_delta()),
            result,
        ))
    }

    /// Run the stage
    ///
    /// # Errors
    /// See [`Self::evaluate_model`]
    pub fn initiate_model_evaluation<S: ModelStore + ?Sized>(
        &self,
        ingestion: &IngestionArtifact,
        trainer: &TrainerArtifact,
        store: &S,
    ) -> Result<EvaluationArtifact> {
        Ok(self.run(ingestion, trainer, store)?.0)
    }
}
