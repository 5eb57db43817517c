//! CART regression tree (squared-error splits)
//!
//! Nodes live in a flat arena indexed from the root at 0, so deep trees
//! serialize without nesting.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{check_shape, check_width, metrics::mean, usize_param, Estimator, HyperParams};
use crate::{Error, Result};

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Terminal node predicting the mean target of its rows
    Leaf {
        /// Predicted value
        value: f64,
    },
    /// Internal node: `x[feature] <= threshold` goes left
    Split {
        /// Feature index
        feature: usize,
        /// Split threshold (midpoint between adjacent distinct values)
        threshold: f64,
        /// Arena index of the left child
        left: usize,
        /// Arena index of the right child
        right: usize,
    },
}

/// Growth limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TreeLimits {
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

/// Grow a tree over the rows in `indices`
pub(crate) fn grow(x: &Array2<f64>, y: &[f64], limits: TreeLimits) -> Vec<Node> {
    let mut nodes = vec![Node::Leaf { value: 0.0 }];
    let mut pending: Vec<(usize, Vec<usize>, usize)> = vec![(0, (0..y.len()).collect(), 0)];

    while let Some((slot, rows, depth)) = pending.pop() {
        let targets: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
        nodes[slot] = Node::Leaf { value: mean(&targets) };

        let depth_left = limits.max_depth.map_or(true, |d| depth < d);
        if !depth_left || rows.len() < limits.min_samples_split {
            continue;
        }
        let Some((feature, threshold)) = best_split(x, y, &rows) else {
            continue;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&i| x[[i, feature]] <= threshold);

        let left = nodes.len();
        let right = left + 1;
        nodes.push(Node::Leaf { value: 0.0 });
        nodes.push(Node::Leaf { value: 0.0 });
        nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        // Right is pushed first so the left subtree is grown first
        pending.push((right, right_rows, depth + 1));
        pending.push((left, left_rows, depth + 1));
    }
    nodes
}

/// Lowest-SSE split of `rows`; `None` when no split reduces the error
fn best_split(x: &Array2<f64>, y: &[f64], rows: &[usize]) -> Option<(usize, f64)> {
    let n = rows.len() as f64;
    let total: f64 = rows.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = rows.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total * total / n;
    if parent_sse <= 1e-12 {
        return None;
    }

    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..x.ncols() {
        let mut order = rows.to_vec();
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let (mut sum_l, mut sq_l) = (0.0, 0.0);
        for pos in 1..order.len() {
            let prev = order[pos - 1];
            sum_l += y[prev];
            sq_l += y[prev] * y[prev];

            let (lo, hi) = (x[[prev, feature]], x[[order[pos], feature]]);
            if lo >= hi {
                continue;
            }
            let n_l = pos as f64;
            let n_r = n - n_l;
            let sum_r = total - sum_l;
            let sq_r = total_sq - sq_l;
            let sse = (sq_l - sum_l * sum_l / n_l) + (sq_r - sum_r * sum_r / n_r);

            if best.map_or(true, |(b, _, _)| sse < b) {
                best = Some((sse, feature, lo + (hi - lo) / 2.0));
            }
        }
    }

    best.filter(|&(sse, _, _)| sse < parent_sse - 1e-12)
        .map(|(_, feature, threshold)| (feature, threshold))
}

/// Walk the arena for one row
pub(crate) fn predict_row(nodes: &[Node], row: ArrayView1<'_, f64>) -> f64 {
    let mut at = 0;
    loop {
        match nodes[at] {
            Node::Leaf { value } => return value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => at = if row[feature] <= threshold { left } else { right },
        }
    }
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    n_features: usize,
    nodes: Vec<Node>,
}

impl DecisionTreeRegressor {
    /// Number of nodes in the arena
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, counted in splits
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((at, d)) = stack.pop() {
            match self.nodes[at] {
                Node::Leaf { .. } => deepest = deepest.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left, d + 1));
                    stack.push((right, d + 1));
                }
            }
        }
        deepest
    }
}

impl Estimator for DecisionTreeRegressor {
    /// `max_depth = 0` means unlimited
    const PARAMS: &'static [&'static str] = &["max_depth", "min_samples_split"];

    fn fit(x: &Array2<f64>, y: &[f64], params: &HyperParams) -> Result<Self> {
        check_shape(x, y)?;
        let max_depth = usize_param(params, "max_depth", 0)?;
        let min_samples_split = usize_param(params, "min_samples_split", 2)?;
        if min_samples_split < 2 {
            return Err(Error::Model("min_samples_split must be at least 2".to_string()));
        }
        let limits = TreeLimits {
            max_depth: (max_depth > 0).then_some(max_depth),
            min_samples_split,
        };
        Ok(Self {
            n_features: x.ncols(),
            nodes: grow(x, y, limits),
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_width(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|r| predict_row(&self.nodes, r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(depth: f64) -> HyperParams {
        let mut p = HyperParams::new();
        p.insert("max_depth".to_string(), depth);
        p
    }

    #[test]
    fn test_step_function_single_split() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [5.0, 5.0, 5.0, 9.0, 9.0, 9.0];
        let tree = DecisionTreeRegressor::fit(&x, &y, &params(0.0)).unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&array![[0.0], [6.4], [6.6], [100.0]]).unwrap(), vec![5.0, 5.0, 9.0, 9.0]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..32).map(|i| f64::from(i * i)).collect();
        let stump = DecisionTreeRegressor::fit(&x, &y, &params(1.0)).unwrap();
        let deep = DecisionTreeRegressor::fit(&x, &y, &params(0.0)).unwrap();

        assert_eq!(stump.depth(), 1);
        assert!(deep.depth() > 1);
        assert!((deep.score(&x, &y).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0]];
        let tree = DecisionTreeRegressor::fit(&x, &[3.0, 3.0], &params(0.0)).unwrap();
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_min_samples_split_validation() {
        let mut p = HyperParams::new();
        p.insert("min_samples_split".to_string(), 1.0);
        assert!(DecisionTreeRegressor::fit(&array![[1.0]], &[1.0], &p).is_err());
    }
}
