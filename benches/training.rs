//! Model fitting benchmarks
//!
//! Benchmarks for the candidate families and the grid search:
//! - Estimator fit on dense matrices of growing size
//! - Grid search with 3-fold cross-validation
//! - Composite encoder fit
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use ndarray::Array2;
use shipment_cost::model::{GridSearch, HyperParams, ModelFamily};
use shipment_cost::preprocessing::ColumnTransformer;

/// Deterministic features and a linear target with a step
#[allow(clippy::cast_precision_loss)]
fn create_matrix(rows: usize, cols: usize) -> (Array2<f64>, Vec<f64>) {
    let x = Array2::from_shape_fn((rows, cols), |(i, j)| ((i * 31 + j * 17) % 97) as f64 / 9.7);
    let y = x
        .rows()
        .into_iter()
        .map(|r| r.sum() * 2.5 + if r[0] > 5.0 { 10.0 } else { 0.0 })
        .collect();
    (x, y)
}

#[allow(clippy::cast_precision_loss)]
fn create_shipments(rows: usize) -> RecordBatch {
    let materials = ["Brass", "Clay", "Aluminium", "Wood", "Marble", "Stone", "Bronze"];
    let schema = Schema::new(vec![
        Field::new("Weight", DataType::Float64, false),
        Field::new("Height", DataType::Float64, false),
        Field::new("Material", DataType::Utf8, false),
        Field::new("Express Shipment", DataType::Utf8, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Float64Array::from_iter_values((0..rows).map(|i| (i % 500) as f64 * 3.1))),
            Arc::new(Float64Array::from_iter_values((0..rows).map(|i| (i % 40) as f64))),
            Arc::new(StringArray::from_iter_values((0..rows).map(|i| materials[i % materials.len()]))),
            Arc::new(StringArray::from_iter_values(
                (0..rows).map(|i| if i % 3 == 0 { "Yes" } else { "No" }),
            )),
        ],
    )
    .unwrap()
}

fn bench_estimator_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimator_fit");

    for rows in &[200, 1_000, 5_000] {
        let (x, y) = create_matrix(*rows, 12);
        for family in [
            ModelFamily::LinearRegression,
            ModelFamily::DecisionTree,
            ModelFamily::GradientBoosting,
        ] {
            let mut params = HyperParams::new();
            if family == ModelFamily::GradientBoosting {
                params.insert("n_estimators".to_string(), 20.0);
            }
            group.bench_with_input(BenchmarkId::new(family.as_str(), rows), rows, |b, _| {
                b.iter(|| family.fit(black_box(&x), black_box(&y), &params).unwrap());
            });
        }
    }

    group.finish();
}

fn bench_knn_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_predict");

    for rows in &[500, 2_000] {
        let (x, y) = create_matrix(*rows, 12);
        let model = ModelFamily::KNeighbors.fit(&x, &y, &HyperParams::new()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| model.predict(black_box(&x)).unwrap());
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let (x, y) = create_matrix(1_000, 12);
    let (x_test, y_test) = create_matrix(250, 12);

    let mut grid = IndexMap::new();
    grid.insert("max_depth".to_string(), vec![3.0, 6.0, 0.0]);
    grid.insert("min_samples_split".to_string(), vec![2.0, 10.0]);
    let search = GridSearch::new(ModelFamily::DecisionTree, grid, 3);

    c.bench_function("grid_search_decision_tree_6x3", |b| {
        b.iter(|| {
            search
                .run("decision_tree", black_box(&x), &y, &x_test, &y_test)
                .unwrap()
        });
    });
}

fn bench_transformer_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("transformer_fit_transform");

    for rows in &[1_000, 10_000] {
        let batch = create_shipments(*rows);
        let transformer = ColumnTransformer::new(
            vec!["Express Shipment".to_string()],
            vec!["Material".to_string()],
            vec!["Weight".to_string(), "Height".to_string()],
        );
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| transformer.fit_transform(black_box(&batch)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_estimator_fit,
    bench_knn_predict,
    bench_grid_search,
    bench_transformer_fit
);
criterion_main!(benches);
