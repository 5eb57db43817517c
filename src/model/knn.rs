//! k-nearest-neighbours regression (uniform weights, Euclidean distance)

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{check_shape, check_width, usize_param, Estimator, HyperParams};
use crate::{Error, Result};

/// Fitted neighbours model; keeps the whole training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    n_neighbors: usize,
    n_features: usize,
    points: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl KNeighborsRegressor {
    /// Effective neighbour count (capped at the training size)
    #[must_use]
    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors.min(self.targets.len())
    }
}

impl Estimator for KNeighborsRegressor {
    const PARAMS: &'static [&'static str] = &["n_neighbors"];

    fn fit(x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<Self> {
        check_shape(x, y)?;
        let n_neighbors = usize_param(params, "n_neighbors", 5)?;
        if n_neighbors == 0 {
            return Err(Error::Model("n_neighbors must be at least 1".to_string()));
        }
        Ok(Self {
            n_neighbors,
            n_features: x.ncols(),
            points: x.rows().into_iter().map(|r| r.to_vec()).collect(),
            targets: y.to_vec(),
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_width(x, self.n_features)?;
        let k = self.n_neighbors();
        let predictions = x
            .rows()
            .into_iter()
            .map(|query| {
                let mut dist: Vec<(f64, usize)> = self
                    .points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let d: f64 = p.iter().zip(query.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                        (d, i)
                    })
                    .collect();
                // Stable on ties: earlier training rows win
                dist.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                dist[..k].iter().map(|&(_, i)| self.targets[i]).sum::<f64>() / k as f64
            })
            .collect();
        Ok(predictions)
    }
}
