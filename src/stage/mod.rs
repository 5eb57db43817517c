//! Pipeline stages
//!
//! Each stage owns an immutable config, takes the artifacts of earlier stages
//! by reference, and returns its own artifact. Errors leave a stage wrapped
//! in [`crate::Error::Stage`] naming the stage and the failing operation.

pub mod evaluation;
pub mod ingestion;
pub mod pusher;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use evaluation::{ModelEvaluation, ModelEvaluationConfig};
pub use ingestion::{split_indices, DataIngestion, DataIngestionConfig};
pub use pusher::{ModelPusher, ModelPusherConfig};
pub use trainer::{ModelTrainer, ModelTrainerConfig, TrainingReport};
pub use transformation::{DataTransformation, DataTransformationConfig};
pub use validation::{DataValidation, DataValidationConfig, DriftOutcome, ValidationReport};
