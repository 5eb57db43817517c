//! Exhaustive hyperparameter search with k-fold cross-validation
//!
//! Every combination of the grid is scored by mean R² over contiguous,
//! unshuffled folds of the training split. The best combination (first one on
//! ties, in grid order) is refit on the whole training split and scored once
//! on the held-out test split; that test score ranks candidates against each
//! other.

use indexmap::IndexMap;
use ndarray::{Array2, Axis};
use tracing::debug;

use super::{metrics::mean, FittedModel, HyperParams, ModelFamily};
use crate::{Error, Result};

/// Result of searching one candidate family
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Candidate identifier from `model.yaml`
    pub name: String,
    /// Winning hyperparameters
    pub params: HyperParams,
    /// Mean cross-validation R² of the winning hyperparameters
    pub cv_score: f64,
    /// R² of the refit model on the test split
    pub test_score: f64,
    /// Refit model
    pub model: FittedModel,
}

/// Grid search over one model family
#[derive(Debug, Clone)]
pub struct GridSearch {
    family: ModelFamily,
    grid: IndexMap<String, Vec<f64>>,
    folds: usize,
}

impl GridSearch {
    /// Search `grid` for `family` using `folds` cross-validation folds
    #[must_use]
    pub fn new(family: ModelFamily, grid: IndexMap<String, Vec<f64>>, folds: usize) -> Self {
        Self {
            family,
            grid,
            folds,
        }
    }

    /// All hyperparameter combinations; the last grid key varies fastest
    ///
    /// An empty grid yields one empty combination (family defaults).
    #[must_use]
    pub fn combinations(&self) -> Vec<HyperParams> {
        let mut combos = vec![HyperParams::new()];
        for (name, values) in &self.grid {
            combos = combos
                .into_iter()
                .flat_map(|base| {
                    values.iter().map(move |v| {
                        let mut next = base.clone();
                        next.insert(name.clone(), *v);
                        next
                    })
                })
                .collect();
        }
        combos
    }

    /// Mean R² of `params` over the folds of `(x, y)`
    ///
    /// # Errors
    /// Returns error if any fold fails to fit
    pub fn cross_validate(&self, x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<f64> {
        let mut scores = Vec::with_capacity(self.folds);
        for (train, valid) in kfold_indices(y.len(), self.folds)? {
            let x_train = x.select(Axis(0), &train);
            let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
            let x_valid = x.select(Axis(0), &valid);
            let y_valid: Vec<f64> = valid.iter().map(|&i| y[i]).collect();

            let model = self.family.fit(&x_train, &y_train, params)?;
            scores.push(model.score(&x_valid, &y_valid)?);
        }
        Ok(mean(&scores))
    }

    /// Run the search and score the refit winner on the test split
    ///
    /// # Errors
    /// Returns error if the grid has an empty value list, there are fewer
    /// training rows than folds, or fitting fails
    pub fn run(
        &self,
        name: &str,
        x_train: &Array2<f64>,
        y_train: &[f64],
        x_test: &Array2<f64>,
        y_test: &[f64],
    ) -> Result<SearchOutcome> {
        if let Some((param, _)) = self.grid.iter().find(|(_, v)| v.is_empty()) {
            return Err(Error::Config(format!("{name}: grid for {param} is empty")));
        }

        let mut best: Option<(f64, HyperParams)> = None;
        for params in self.combinations() {
            let score = self.cross_validate(x_train, y_train, &params)?;
            debug!(candidate = name, ?params, cv_r2 = score, "grid point scored");
            // NaN scores never win
            if best.as_ref().map_or(!score.is_nan(), |(b, _)| score > *b) {
                best = Some((score, params));
            }
        }
        let (cv_score, params) = match best {
            Some(found) => found,
            None => (f64::NAN, self.combinations().swap_remove(0)),
        };

        let model = self.family.fit(x_train, y_train, &params)?;
        let test_score = model.score(x_test, y_test)?;
        Ok(SearchOutcome {
            name: name.to_string(),
            params,
            cv_score,
            test_score,
            model,
        })
    }
}

/// Contiguous k-fold split: the first `n % k` folds get one extra row
///
/// # Errors
/// Returns [`Error::Model`] if `k < 2` or `n < k`
pub fn kfold_indices(n: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 || n < k {
        return Err(Error::Model(format!(
            "cannot split {n} rows into {k} folds"
        )));
    }
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let valid: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n).collect();
        folds.push((train, valid));
        start = end;
    }
    Ok(folds)
}
