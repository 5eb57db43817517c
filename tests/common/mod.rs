//! Synthetic shipment records shared by the integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use shipment_cost::config::{ArtifactLayout, ModelConfig, PipelineConfig, SchemaConfig};
use shipment_cost::source::MemorySource;

pub const DATABASE: &str = "shipping";
pub const COLLECTION: &str = "shipping_data";

/// 14 columns after the 3 drop columns are removed, target `Cost`
pub const SCHEMA: &str = r"
columns: 14
drop_columns: [Customer Id, Artist Name, Customer Location]
numerical_columns:
  - Artist Reputation
  - Height
  - Width
  - Weight
  - Price Of Sculpture
  - Base Shipping Price
categorical_columns:
  - Material
  - International
  - Express Shipment
  - Installation Included
  - Transport
  - Fragile
  - Remote Location
onehot_columns: [International, Express Shipment, Installation Included, Fragile]
binary_columns: [Material, Transport, Remote Location]
target_column: Cost
";

pub const MODEL: &str = r"
base_model_score: 0.5
cv_folds: 3
train_model:
  linear_regression:
    search_param_grid:
      alpha: [0.0, 1.0]
  k_neighbors:
    search_param_grid:
      n_neighbors: [3, 5]
  decision_tree:
    search_param_grid:
      max_depth: [4, 0]
";

const MATERIALS: [&str; 5] = ["Brass", "Clay", "Aluminium", "Wood", "Marble"];
const TRANSPORTS: [&str; 3] = ["Airways", "Roadways", "Waterways"];
const YES_NO: [&str; 2] = ["Yes", "No"];

/// `rows` documents with a near-linear cost; every 25th row (offset 7) has no Height
#[allow(clippy::cast_precision_loss)]
pub fn documents(rows: usize, seed: u64) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows)
        .map(|i| {
            let weight: f64 = rng.gen_range(100.0..5000.0);
            let height: f64 = rng.gen_range(5.0..50.0);
            let width: f64 = rng.gen_range(2.0..20.0);
            let reputation: f64 = rng.gen_range(0.0..1.0);
            let price: f64 = rng.gen_range(10.0..2000.0);
            let base: f64 = rng.gen_range(5.0..80.0);
            let material = MATERIALS[rng.gen_range(0..MATERIALS.len())];
            let transport = TRANSPORTS[rng.gen_range(0..TRANSPORTS.len())];
            let express = YES_NO[rng.gen_range(0..2)];
            let international = YES_NO[rng.gen_range(0..2)];

            let cost = 50.0
                + 0.2 * weight
                + 4.0 * height
                + 0.1 * price
                + base
                + if express == "Yes" { 150.0 } else { 0.0 }
                + rng.gen_range(-5.0..5.0);

            let mut doc = json!({
                "_id": format!("{i:024x}"),
                "Customer Id": format!("fffe{i:08}"),
                "Artist Name": format!("Artist {i}"),
                "Customer Location": format!("Town {}", i % 7),
                "Artist Reputation": reputation,
                "Height": height,
                "Width": width,
                "Weight": weight,
                "Material": material,
                "Price Of Sculpture": price,
                "Base Shipping Price": base,
                "International": international,
                "Express Shipment": express,
                "Installation Included": YES_NO[i % 2],
                "Transport": transport,
                "Fragile": YES_NO[(i / 2) % 2],
                "Remote Location": YES_NO[(i / 3) % 2],
                "Cost": cost,
            });
            if i % 25 == 7 {
                if let Some(map) = doc.as_object_mut() {
                    map.remove("Height");
                }
            }
            doc
        })
        .collect()
}

pub fn source(rows: usize, seed: u64) -> MemorySource {
    MemorySource::new().with_collection(DATABASE, COLLECTION, documents(rows, seed))
}

pub fn pipeline_config(run_dir: &std::path::Path) -> PipelineConfig {
    let schema = SchemaConfig::from_yaml_str(SCHEMA).unwrap();
    let model = ModelConfig::from_yaml_str(MODEL).unwrap();
    PipelineConfig::new(schema, model, ArtifactLayout::at(run_dir))
        .with_source(DATABASE, COLLECTION)
        .with_bucket("models")
        .with_split_seed(7)
}
