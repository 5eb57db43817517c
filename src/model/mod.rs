//! Regression estimators, hyperparameter search and the composite cost model
//!
//! Every family implements [`Estimator`]. [`ModelFamily`] maps the identifiers
//! used in `model.yaml` to a family, and [`FittedModel`] is the serializable
//! union of fitted estimators.

pub mod boosting;
pub mod knn;
pub mod linear;
pub mod metrics;
pub mod predictor;
pub mod search;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use boosting::GradientBoostingRegressor;
pub use knn::KNeighborsRegressor;
pub use linear::LinearRegression;
pub use metrics::r2_score;
pub use predictor::CostModel;
pub use search::{GridSearch, SearchOutcome};
pub use tree::DecisionTreeRegressor;

/// One hyperparameter assignment (name -> value)
pub type HyperParams = IndexMap<String, f64>;

/// Fit / predict / score capability shared by every model family
pub trait Estimator: Sized {
    /// Hyperparameter names this family accepts
    const PARAMS: &'static [&'static str];

    /// Fit on `x` (rows x features) and `y`
    ///
    /// # Errors
    /// Returns [`Error::Model`] on shape mismatch, empty input or a bad
    /// hyperparameter value
    fn fit(x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<Self>;

    /// Predict one value per row of `x`
    ///
    /// # Errors
    /// Returns [`Error::Model`] if `x` has the wrong number of features
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// R² of the predictions on `x` against `y`
    ///
    /// # Errors
    /// Returns error if prediction fails
    fn score(&self, x: &Array2<f64>, y: &[f64]) -> Result<f64> {
        Ok(r2_score(y, &self.predict(x)?))
    }
}

/// Reject hyperparameters a family does not know
pub(crate) fn check_params(family: &str, params: &HyperParams, allowed: &[&str]) -> Result<()> {
    for name in params.keys() {
        if !allowed.contains(&name.as_str()) {
            return Err(Error::Config(format!(
                "{family} has no hyperparameter {name:?} (expected one of {allowed:?})"
            )));
        }
    }
    Ok(())
}

/// Non-negative integer hyperparameter, or `default` when absent
pub(crate) fn usize_param(params: &HyperParams, name: &str, default: usize) -> Result<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(&v) if v >= 0.0 && v.fract() == 0.0 && v.is_finite() => Ok(v as usize),
        Some(v) => Err(Error::Model(format!(
            "{name} must be a non-negative integer, got {v}"
        ))),
    }
}

pub(crate) fn check_shape(x: &Array2<f64>, y: &[f64]) -> Result<()> {
    if x.nrows() == 0 {
        return Err(Error::Model("cannot fit on zero rows".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(Error::Model(format!(
            "feature rows ({}) and target length ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_width(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() == expected {
        Ok(())
    } else {
        Err(Error::Model(format!(
            "expected {expected} features, got {}",
            x.ncols()
        )))
    }
}

/// Model families selectable from `model.yaml`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Ridge-regularised least squares
    LinearRegression,
    /// k-nearest-neighbours mean
    KNeighbors,
    /// CART regression tree
    DecisionTree,
    /// Gradient-boosted regression trees
    GradientBoosting,
}

impl ModelFamily {
    /// Identifier used in `model.yaml`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::KNeighbors => "k_neighbors",
            Self::DecisionTree => "decision_tree",
            Self::GradientBoosting => "gradient_boosting",
        }
    }

    /// Hyperparameter names accepted by this family
    #[must_use]
    pub const fn params(self) -> &'static [&'static str] {
        match self {
            Self::LinearRegression => LinearRegression::PARAMS,
            Self::KNeighbors => KNeighborsRegressor::PARAMS,
            Self::DecisionTree => DecisionTreeRegressor::PARAMS,
            Self::GradientBoosting => GradientBoostingRegressor::PARAMS,
        }
    }

    /// Fit an estimator of this family
    ///
    /// # Errors
    /// Returns error if the hyperparameters are invalid or fitting fails
    pub fn fit(self, x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<FittedModel> {
        check_params(self.as_str(), params, self.params())?;
        Ok(match self {
            Self::LinearRegression => FittedModel::LinearRegression(LinearRegression::fit(x, y, params)?),
            Self::KNeighbors => FittedModel::KNeighbors(KNeighborsRegressor::fit(x, y, params)?),
            Self::DecisionTree => FittedModel::DecisionTree(DecisionTreeRegressor::fit(x, y, params)?),
            Self::GradientBoosting => {
                FittedModel::GradientBoosting(GradientBoostingRegressor::fit(x, y, params)?)
            }
        })
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear_regression" => Ok(Self::LinearRegression),
            "k_neighbors" => Ok(Self::KNeighbors),
            "decision_tree" => Ok(Self::DecisionTree),
            "gradient_boosting" => Ok(Self::GradientBoosting),
            other => Err(Error::Config(format!("unknown model family {other:?}"))),
        }
    }
}

/// Any fitted estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FittedModel {
    /// Fitted linear model
    LinearRegression(LinearRegression),
    /// Fitted neighbours model
    KNeighbors(KNeighborsRegressor),
    /// Fitted tree
    DecisionTree(DecisionTreeRegressor),
    /// Fitted boosted ensemble
    GradientBoosting(GradientBoostingRegressor),
}

impl FittedModel {
    /// Family of the fitted estimator
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        match self {
            Self::LinearRegression(_) => ModelFamily::LinearRegression,
            Self::KNeighbors(_) => ModelFamily::KNeighbors,
            Self::DecisionTree(_) => ModelFamily::DecisionTree,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
        }
    }

    /// Predict one value per row
    ///
    /// # Errors
    /// Returns error if `x` has the wrong number of features
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        match self {
            Self::LinearRegression(m) => m.predict(x),
            Self::KNeighbors(m) => m.predict(x),
            Self::DecisionTree(m) => m.predict(x),
            Self::GradientBoosting(m) => m.predict(x),
        }
    }

    /// R² on `x` against `y`
    ///
    /// # Errors
    /// Returns error if prediction fails
    pub fn score(&self, x: &Array2<f64>, y: &[f64]) -> Result<f64> {
        Ok(r2_score(y, &self.predict(x)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_family_identifiers_round_trip() {
        for family in [
            ModelFamily::LinearRegression,
            ModelFamily::KNeighbors,
            ModelFamily::DecisionTree,
            ModelFamily::GradientBoosting,
        ] {
            assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
        }
        assert!("xgboost".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_unknown_hyperparameter_rejected() {
        let x = array![[1.0], [2.0]];
        let mut params = HyperParams::new();
        params.insert("gamma".to_string(), 1.0);
        let err = ModelFamily::KNeighbors.fit(&x, &[1.0, 2.0], &params).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_usize_param_validation() {
        let mut params = HyperParams::new();
        assert_eq!(usize_param(&params, "k", 5).unwrap(), 5);
        params.insert("k".to_string(), 2.5);
        assert!(usize_param(&params, "k", 5).is_err());
    }

    #[test]
    fn test_fitted_model_json_is_tagged() {
        let x = array![[0.0], [1.0], [2.0]];
        let model = ModelFamily::LinearRegression
            .fit(&x, &[1.0, 3.0, 5.0], &HyperParams::new())
            .unwrap();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"family\":\"linear_regression\""));
        let back: FittedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.family(), ModelFamily::LinearRegression);
    }
}
