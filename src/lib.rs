//! # shipment-cost: Batch Training Pipeline for Shipment Cost Regression
//!
//! **Version**: 0.1.0
//!
//! Fetches shipment records, validates and transforms them, grid-searches a
//! set of candidate regressors, compares the winner with the production model
//! and promotes it to a bucket/key model store.
//!
//! ```text
//! INGEST -> VALIDATE -> TRANSFORM -> TRAIN -> EVALUATE -> PUSH (if accepted)
//! ```
//!
//! Stages exchange immutable artifacts (see [`artifact`]) that point at files
//! under a per-run timestamped directory. Every stage error is tagged with the
//! stage and operation that raised it ([`Error::Stage`]).
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use shipment_cost::config::{ArtifactLayout, ModelConfig, PipelineConfig, SchemaConfig};
//! use shipment_cost::pipeline::TrainingPipeline;
//! use shipment_cost::source::JsonDirSource;
//! use shipment_cost::store::FsModelStore;
//!
//! let schema = SchemaConfig::from_yaml_file("config/schema.yaml")?;
//! let model = ModelConfig::from_yaml_file("config/model.yaml")?;
//! let layout = ArtifactLayout::timestamped("artifacts", chrono::Local::now());
//! let config = PipelineConfig::new(schema, model, layout).with_split_seed(42);
//!
//! let run = TrainingPipeline::new(config)
//!     .run_pipeline(&JsonDirSource::new("data"), &FsModelStore::new("model-store"))?;
//! println!("{:?}", run.outcome);
//! # Ok::<(), shipment_cost::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifact;
pub mod config;
pub mod drift;
pub mod error;
pub mod frame;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod source;
pub mod stage;
pub mod store;
pub mod tracking;

pub use error::{Error, Result, StageContext, StageName};
