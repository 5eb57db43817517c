//! Training pipeline orchestrator
//!
//! Runs the six stages strictly in sequence:
//!
//! ```text
//! INGEST -> VALIDATE -> TRANSFORM -> TRAIN -> EVALUATE -> PUSH (if accepted)
//! ```
//!
//! Every transition consumes the previous artifact. The first error aborts
//! the run; there is no resume. Whatever happened is written to
//! `run_manifest.json` at the run root, including failed runs.

use std::fmt;

use tracing::{error, info, warn};

use crate::artifact::{
    EvaluationArtifact, IngestionArtifact, PushArtifact, TrainerArtifact, TransformationArtifact,
    ValidationArtifact,
};
use crate::config::PipelineConfig;
use crate::error::StageName;
use crate::source::DocumentSource;
use crate::stage::{
    DataIngestion, DataIngestionConfig, DataTransformation, DataTransformationConfig,
    DataValidation, DataValidationConfig, ModelEvaluation, ModelEvaluationConfig, ModelPusher,
    ModelPusherConfig, ModelTrainer, ModelTrainerConfig,
};
use crate::store::ModelStore;
use crate::tracking::{ArtifactRecord, MetricRecord, RunLedger, RunStatus};
use crate::Result;

/// Terminal message for an accepted model
pub const MODEL_ACCEPTED: &str = "Model Accepted";

/// Terminal message for every other outcome
pub const MODEL_NOT_ACCEPTED: &str = "Model not Accepted";

/// How a completed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Evaluation accepted the model and it was pushed
    Accepted,
    /// Evaluation rejected the model; nothing was pushed
    NotAccepted,
    /// No candidate reached the score floor; evaluation and push were skipped
    NoModelProduced,
}

impl PipelineOutcome {
    /// Message printed at the end of the run
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Accepted => MODEL_ACCEPTED,
            Self::NotAccepted | Self::NoModelProduced => MODEL_NOT_ACCEPTED,
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Artifacts of a completed run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// How the run ended
    pub outcome: PipelineOutcome,
    /// Ingestion output
    pub ingestion: IngestionArtifact,
    /// Validation output
    pub validation: ValidationArtifact,
    /// Transformation output
    pub transformation: TransformationArtifact,
    /// Training output
    pub trainer: TrainerArtifact,
    /// Evaluation output, absent when no model was produced
    pub evaluation: Option<EvaluationArtifact>,
    /// Push output, present only for accepted models
    pub push: Option<PushArtifact>,
    /// Everything recorded during the run
    pub ledger: RunLedger,
}

struct StageArtifacts {
    outcome: PipelineOutcome,
    ingestion: IngestionArtifact,
    validation: ValidationArtifact,
    transformation: TransformationArtifact,
    trainer: TrainerArtifact,
    evaluation: Option<EvaluationArtifact>,
    push: Option<PushArtifact>,
}

/// End-to-end training run over one config
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    /// Create a pipeline for `config`
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run identifier (the run directory name)
    #[must_use]
    pub fn run_id(&self) -> String {
        self.config
            .layout
            .run_dir()
            .file_name()
            .map_or_else(|| "run".to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Run every stage, printing the acceptance message at the end
    ///
    /// The run manifest is written before returning, on success or failure.
    ///
    /// # Errors
    /// Returns the first stage error, tagged with stage and operation, or an
    /// error if the manifest of a successful run cannot be written
    pub fn run_pipeline<D, S>(&self, source: &D, store: &S) -> Result<PipelineRun>
    where
        D: DocumentSource + ?Sized,
        S: ModelStore + ?Sized,
    {
        let mut ledger = RunLedger::new(self.run_id());
        ledger.run_mut().start();
        info!(run_id = %self.run_id(), run_dir = %self.config.layout.run_dir().display(), "pipeline started");

        let result = self.execute(source, store, &mut ledger);
        let manifest = self.config.layout.manifest();

        match result {
            Ok(stages) => {
                ledger.run_mut().complete(RunStatus::Success);
                ledger.write_json(&manifest)?;

                println!("{}", stages.outcome);
                info!(outcome = ?stages.outcome, "{}", stages.outcome);

                Ok(PipelineRun {
                    outcome: stages.outcome,
                    ingestion: stages.ingestion,
                    validation: stages.validation,
                    transformation: stages.transformation,
                    trainer: stages.trainer,
                    evaluation: stages.evaluation,
                    push: stages.push,
                    ledger,
                })
            }
            Err(e) => {
                error!(stage = ?e.stage(), error = %e, "pipeline failed");
                ledger.run_mut().fail(e.stage(), e.to_string());
                if let Err(write_err) = ledger.write_json(&manifest) {
                    warn!(path = %manifest.display(), error = %write_err, "could not write run manifest");
                }
                Err(e)
            }
        }
    }

    fn execute<D, S>(&self, source: &D, store: &S, ledger: &mut RunLedger) -> Result<StageArtifacts>
    where
        D: DocumentSource + ?Sized,
        S: ModelStore + ?Sized,
    {
        let config = &self.config;

        let ingestion = DataIngestion::new(DataIngestionConfig::from_pipeline(config))
            .initiate_data_ingestion(source)?;
        record_file(ledger, StageName::Ingestion, "train_csv", ingestion.train_path());
        record_file(ledger, StageName::Ingestion, "test_csv", ingestion.test_path());
        ledger.run_mut().stage_completed(StageName::Ingestion);

        let (validation, report) =
            DataValidation::new(DataValidationConfig::from_pipeline(config)).run(&ingestion)?;
        record_file(ledger, StageName::Validation, "drift_report", validation.drift_report_path());
        ledger.record_metric(MetricRecord::new(
            StageName::Validation,
            "drift_share",
            0,
            report.drift_share,
        ));
        if !validation.validation_status() {
            warn!("validation status is false, continuing");
        }
        ledger.run_mut().stage_completed(StageName::Validation);

        let transformation = DataTransformation::new(DataTransformationConfig::from_pipeline(config))
            .initiate_data_transformation(&ingestion)?;
        record_file(
            ledger,
            StageName::Transformation,
            "transformer_object",
            transformation.transformer_object_path(),
        );
        record_file(
            ledger,
            StageName::Transformation,
            "transformed_train",
            transformation.transformed_train_path(),
        );
        record_file(
            ledger,
            StageName::Transformation,
            "transformed_test",
            transformation.transformed_test_path(),
        );
        ledger.run_mut().stage_completed(StageName::Transformation);

        let (trainer, training) =
            ModelTrainer::new(ModelTrainerConfig::from_pipeline(config)).run(&transformation)?;
        for (step, candidate) in (0_u64..).zip(&training.candidates) {
            ledger.record_metric(MetricRecord::candidate(
                &candidate.name,
                "cv_r2",
                step,
                candidate.cv_score,
            ));
            ledger.record_metric(MetricRecord::candidate(
                &candidate.name,
                "test_r2",
                step,
                candidate.test_score,
            ));
        }
        ledger.run_mut().stage_completed(StageName::Training);

        let Some(model_path) = trainer.trained_model_path() else {
            warn!(
                best = trainer.best_model_name(),
                score = trainer.best_model_score(),
                "no model produced, skipping evaluation and push"
            );
            return Ok(StageArtifacts {
                outcome: PipelineOutcome::NoModelProduced,
                ingestion,
                validation,
                transformation,
                trainer,
                evaluation: None,
                push: None,
            });
        };
        record_file(ledger, StageName::Training, "trained_model", model_path);

        let (evaluation, result) = ModelEvaluation::new(ModelEvaluationConfig::from_pipeline(config))
            .run(&ingestion, &trainer, store)?;
        ledger.record_metric(MetricRecord::new(
            StageName::Evaluation,
            "trained_r2",
            0,
            result.trained_score(),
        ));
        if let Some(incumbent) = result.incumbent_score() {
            ledger.record_metric(MetricRecord::new(
                StageName::Evaluation,
                "incumbent_r2",
                0,
                incumbent,
            ));
        }
        ledger.record_metric(MetricRecord::new(
            StageName::Evaluation,
            "score_delta",
            0,
            result.score_delta(),
        ));
        ledger.record_evaluation(result);
        ledger.run_mut().stage_completed(StageName::Evaluation);

        if !evaluation.accepted() {
            return Ok(StageArtifacts {
                outcome: PipelineOutcome::NotAccepted,
                ingestion,
                validation,
                transformation,
                trainer,
                evaluation: Some(evaluation),
                push: None,
            });
        }

        let push = ModelPusher::new(ModelPusherConfig::from_pipeline(config))
            .initiate_model_pusher(&evaluation, &trainer, store)?;
        ledger.run_mut().stage_completed(StageName::Pusher);

        Ok(StageArtifacts {
            outcome: PipelineOutcome::Accepted,
            ingestion,
            validation,
            transformation,
            trainer,
            evaluation: Some(evaluation),
            push: Some(push),
        })
    }
}

fn record_file(ledger: &mut RunLedger, stage: StageName, key: &str, path: &std::path::Path) {
    ledger.record_artifact(ArtifactRecord::from_file(stage, key, path));
}
