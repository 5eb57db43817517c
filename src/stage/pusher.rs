//! Promotion: upload the trained model to the model store

use tracing::{info, instrument};

use crate::artifact::{EvaluationArtifact, PushArtifact, TrainerArtifact};
use crate::config::PipelineConfig;
use crate::error::{StageContext, StageName};
use crate::store::ModelStore;
use crate::{Error, Result};

const STAGE: StageName = StageName::Pusher;

/// Settings for [`ModelPusher`]
#[derive(Debug, Clone)]
pub struct ModelPusherConfig {
    /// Destination bucket
    pub bucket: String,
    /// Destination key, overwritten on every push
    pub model_key: String,
}

impl ModelPusherConfig {
    /// Derive the stage config from the run config
    #[must_use]
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            model_key: config.model_key.clone(),
        }
    }
}

/// Promotion stage. Pushes whatever it is given; acceptance is decided by
/// the caller.
#[derive(Debug, Clone)]
pub struct ModelPusher {
    config: ModelPusherConfig,
}

impl ModelPusher {
    /// Create the stage
    #[must_use]
    pub const fn new(config: ModelPusherConfig) -> Self {
        Self { config }
    }

    /// Upload the trainer's model file under the configured bucket and key
    ///
    /// The evaluation outcome is only logged; a rejected model is pushed too
    /// if this is called.
    ///
    /// # Errors
    /// Returns [`Error::NoTrainedModel`] if the trainer persisted nothing, or
    /// an error if the file cannot be read or the store cannot be written
    #[instrument(skip_all, fields(stage = %STAGE))]
    pub fn initiate_model_pusher<S: ModelStore + ?Sized>(
        &self,
        evaluation: &EvaluationArtifact,
        trainer: &TrainerArtifact,
        store: &S,
    ) -> Result<PushArtifact> {
        let op = "initiate_model_pusher";
        let path = trainer.trained_model_path().ok_or(Error::NoTrainedModel).in_stage(STAGE, op)?;
        store
            .upload_file(path, &self.config.bucket, &self.config.model_key)
            .in_stage(STAGE, op)?;
        info!(
            bucket = %self.config.bucket,
            key = %self.config.model_key,
            model = trainer.best_model_name(),
            accepted = evaluation.accepted(),
            "pushed model"
        );
        Ok(PushArtifact::new(&self.config.bucket, &self.config.model_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryModelStore;

    fn evaluation(accepted: bool) -> EvaluationArtifact {
        EvaluationArtifact::new(accepted, "model.json", if accepted { 0.1 } else { -0.1 })
    }

    fn pusher() -> ModelPusher {
        ModelPusher::new(ModelPusherConfig {
            bucket: "models".to_string(),
            model_key: "model.json".to_string(),
        })
    }

    #[test]
    fn test_push_overwrites_existing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"new").unwrap();

        let store = MemoryModelStore::new();
        store.put("models", "model.json", b"old".to_vec()).unwrap();

        let trainer = TrainerArtifact::new(Some(path), "linear_regression", 0.1);
        let artifact = pusher()
            .initiate_model_pusher(&evaluation(true), &trainer, &store)
            .unwrap();

        assert_eq!(artifact.bucket_name(), "models");
        assert_eq!(artifact.remote_key(), "model.json");
        assert_eq!(store.get("models", "model.json").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_rejected_model_is_still_pushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"rejected").unwrap();

        let store = MemoryModelStore::new();
        let trainer = TrainerArtifact::new(Some(path), "k_neighbors", 0.2);
        pusher()
            .initiate_model_pusher(&evaluation(false), &trainer, &store)
            .unwrap();
        assert!(store.exists("models", "model.json").unwrap());
    }

    #[test]
    fn test_push_without_model_is_error() {
        let store = MemoryModelStore::new();
        let err = pusher()
            .initiate_model_pusher(&evaluation(true), &TrainerArtifact::new(None, "none", 0.0), &store)
            .unwrap_err();
        assert_eq!(err.stage(), Some(StageName::Pusher));
        assert!(matches!(err.root_cause(), Error::NoTrainedModel));
        assert!(store.is_empty());
    }

    #[test]
    fn test_push_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = TrainerArtifact::new(Some(dir.path().join("gone.json")), "x", 1.0);
        let err = pusher()
            .initiate_model_pusher(&evaluation(true), &trainer, &MemoryModelStore::new())
            .unwrap_err();
        assert!(matches!(err.root_cause(), Error::Io(_)));
    }
}
