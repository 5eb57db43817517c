//! Ridge-regularised least squares
//!
//! Features and target are centred, the normal equations
//! `(XᵀX + αI) w = Xᵀy` are solved by Gaussian elimination with partial
//! pivoting, and the intercept is recovered from the means. A tiny ridge is
//! always added so collinear one-hot blocks stay solvable at `alpha = 0`.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_shape, check_width, Estimator, HyperParams};
use crate::{Error, Result};

const RIDGE_FLOOR: f64 = 1e-8;

/// Fitted linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Vec<f64>,
    intercept: f64,
    alpha: f64,
}

impl LinearRegression {
    /// Per-feature weights
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Bias term
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for LinearRegression {
    const PARAMS: &'static [&'static str] = &["alpha"];

    fn fit(x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<Self> {
        check_shape(x, y)?;
        let alpha = params.get("alpha").copied().unwrap_or(0.0);
        if !(alpha >= 0.0 && alpha.is_finite()) {
            return Err(Error::Model(format!("alpha must be >= 0, got {alpha}")));
        }

        let n = x.nrows() as f64;
        let x_mean = x.sum_axis(Axis(0)) / n;
        let y_mean = y.iter().sum::<f64>() / n;
        let xc = x - &x_mean;
        let yc = Array1::from_iter(y.iter().map(|v| v - y_mean));

        let mut gram = xc.t().dot(&xc);
        let trace_scale = (gram.diag().sum() / gram.nrows().max(1) as f64).max(1.0);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha + RIDGE_FLOOR * trace_scale;
        }
        let rhs = xc.t().dot(&yc);

        let coefficients = solve(gram, rhs.to_vec())?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(Self {
            coefficients,
            intercept,
            alpha,
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_width(x, self.coefficients.len())?;
        let w = Array1::from_vec(self.coefficients.clone());
        Ok((x.dot(&w) + self.intercept).to_vec())
    }
}

/// Solve `a · w = b` for square `a`
fn solve(mut a: Array2<f64>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-300 {
            return Err(Error::Model("normal equations are singular".to_string()));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(w)
}
