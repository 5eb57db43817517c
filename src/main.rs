//! `shipment-train`: run the shipment cost training pipeline once
//!
//! ```text
//! shipment-train --schema config/schema.yaml --model-config config/model.yaml \
//!     --source-dir data --store-dir model-store --seed 42
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shipment_cost::config::{
    AcceptancePolicy, ArtifactLayout, GatePolicy, ModelConfig, PipelineConfig, SchemaConfig,
    BUCKET_NAME, COLLECTION_NAME, DB_NAME,
};
use shipment_cost::pipeline::TrainingPipeline;
use shipment_cost::source::JsonDirSource;
use shipment_cost::store::FsModelStore;

#[derive(Parser, Debug)]
#[command(name = "shipment-train", version, about = "Train and promote the shipment cost model")]
struct Cli {
    /// Dataset schema
    #[arg(long, default_value = "config/schema.yaml")]
    schema: PathBuf,
    /// Candidate models and score floor
    #[arg(long, default_value = "config/model.yaml")]
    model_config: PathBuf,
    /// Root of `<database>/<collection>.json` document files
    #[arg(long, default_value = "data")]
    source_dir: PathBuf,
    /// Source database
    #[arg(long, default_value = DB_NAME)]
    database: String,
    /// Source collection inside the database
    #[arg(long, default_value = COLLECTION_NAME)]
    collection: String,
    /// A timestamped run directory is created under this root
    #[arg(long, default_value = "artifacts")]
    artifact_root: PathBuf,
    /// Model store root (one subdirectory per bucket)
    #[arg(long, default_value = "model-store")]
    store_dir: PathBuf,
    /// Bucket holding the production model
    #[arg(long, default_value = BUCKET_NAME)]
    bucket: String,
    /// Fixed train/test split seed
    #[arg(long)]
    seed: Option<u64>,
    /// Accept only models that beat the production model
    #[arg(long)]
    strict_acceptance: bool,
    /// Write the validation decision into the validation artifact
    #[arg(long)]
    record_validation_status: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let schema = SchemaConfig::from_yaml_file(&self.schema)
            .with_context(|| format!("loading schema {}", self.schema.display()))?;
        let model = ModelConfig::from_yaml_file(&self.model_config)
            .with_context(|| format!("loading model config {}", self.model_config.display()))?;
        let layout = ArtifactLayout::timestamped(&self.artifact_root, chrono::Local::now());

        let gates = GatePolicy {
            record_validation_status: self.record_validation_status,
            acceptance: if self.strict_acceptance {
                AcceptancePolicy::StrictImprovement
            } else {
                AcceptancePolicy::AlwaysAccept
            },
        };

        let mut config = PipelineConfig::new(schema, model, layout)
            .with_source(&self.database, &self.collection)
            .with_bucket(&self.bucket)
            .with_gates(gates);
        if let Some(seed) = self.seed {
            config = config.with_split_seed(seed);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config()?;
    info!(run_dir = %config.layout.run_dir().display(), "starting training run");

    let source = JsonDirSource::new(&cli.source_dir);
    let store = FsModelStore::new(&cli.store_dir);
    TrainingPipeline::new(config)
        .run_pipeline(&source, &store)
        .context("training pipeline failed")?;
    Ok(())
}
