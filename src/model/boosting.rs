//! Gradient-boosted regression trees (squared loss)

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::tree::{grow, predict_row, Node, TreeLimits};
use super::{check_shape, check_width, metrics::mean, usize_param, Estimator, HyperParams};
use crate::{Error, Result};

/// Fitted boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    n_features: usize,
    init: f64,
    learning_rate: f64,
    stages: Vec<Vec<Node>>,
}

impl GradientBoostingRegressor {
    /// Number of fitted stages
    #[must_use]
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Estimator for GradientBoostingRegressor {
    const PARAMS: &'static [&'static str] = &["n_estimators", "learning_rate", "max_depth"];

    fn fit(x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<Self> {
        check_shape(x, y)?;
        let n_estimators = usize_param(params, "n_estimators", 100)?;
        let max_depth = usize_param(params, "max_depth", 3)?;
        let learning_rate = params.get("learning_rate").copied().unwrap_or(0.1);
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(Error::Model(format!(
                "learning_rate must be > 0, got {learning_rate}"
            )));
        }
        let limits = TreeLimits {
            max_depth: (max_depth > 0).then_some(max_depth),
            min_samples_split: 2,
        };

        let init = mean(y);
        let mut current = vec![init; y.len()];
        let mut stages = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree = grow(x, &residuals, limits);
            for (pred, row) in current.iter_mut().zip(x.rows()) {
                *pred += learning_rate * predict_row(&tree, row);
            }
            stages.push(tree);
        }

        Ok(Self {
            n_features: x.ncols(),
            init,
            learning_rate,
            stages,
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_width(x, self.n_features)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.init
                    + self
                        .stages
                        .iter()
                        .map(|tree| self.learning_rate * predict_row(tree, row))
                        .sum::<f64>()
            })
            .collect())
    }
}
