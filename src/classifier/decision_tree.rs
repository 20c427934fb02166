//! Binary classification tree (CART, Gini impurity)

use crate::error::{DriftError, Result};
use crate::utils::cmp_f64;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the positive-class share of its training rows
    Leaf { proba: f64, n_samples: usize },
    /// Internal node; rows with `x[feature] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            TreeNode::Leaf { proba, .. } => *proba,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if row[*feature_idx] <= *threshold {
                    left.predict_row(row)
                } else {
                    right.predict_row(row)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Probability tree for 0/1 labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features examined per split (all when None)
    pub max_features: Option<usize>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Create an unfitted tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set features examined per split
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n.max(1));
        self
    }

    /// Fit on the rows listed in `indices` (repeats allowed, as in a
    /// bootstrap sample). Labels must be 0 or 1.
    pub fn fit_indices(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut impl Rng,
    ) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(DriftError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(DriftError::ValidationError("cannot fit a tree on zero rows".to_string()));
        }

        let mut features: Vec<usize> = (0..x.ncols()).collect();
        self.root = Some(self.build(x, y, indices.to_vec(), 0, &mut features, rng));
        Ok(self)
    }

    /// Fit on all rows
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut impl Rng) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices, rng)
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(DriftError::ModelNotFitted)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| root.predict_row(&row.to_vec()))
            .collect())
    }

    /// Depth of the fitted tree
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        features: &mut [usize],
        rng: &mut impl Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let n_pos = indices.iter().filter(|&&i| y[i] > 0.5).count();
        let leaf = TreeNode::Leaf {
            proba: n_pos as f64 / n_samples.max(1) as f64,
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || n_pos == 0
            || n_pos == n_samples;
        if should_stop {
            return leaf;
        }

        let Some((feature_idx, threshold)) = self.find_best_split(x, y, &indices, n_pos, features, rng)
        else {
            return leaf;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build(x, y, left_idx, depth + 1, features, rng));
        let right = Box::new(self.build(x, y, right_idx, depth + 1, features, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
        }
    }

    /// Best Gini split over a random subset of features, scanning each
    /// feature once in sorted order
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        n_pos: usize,
        features: &mut [usize],
        rng: &mut impl Rng,
    ) -> Option<(usize, f64)> {
        let n = indices.len();
        let n_try = self.max_features.unwrap_or(features.len()).min(features.len());
        features.shuffle(rng);

        let parent = gini(n_pos, n);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut pairs: Vec<(f64, bool)> = Vec::with_capacity(n);

        for &feature_idx in features[..n_try].iter() {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (x[[i, feature_idx]], y[i] > 0.5)));
            pairs.sort_by(|a, b| cmp_f64(&a.0, &b.0));

            let mut left_pos = 0usize;
            for k in 0..n - 1 {
                if pairs[k].1 {
                    left_pos += 1;
                }
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let weighted = (n_left as f64 * gini(left_pos, n_left)
                    + n_right as f64 * gini(n_pos - left_pos, n_right))
                    / n as f64;
                let gain = parent - weighted;

                if gain > best.map_or(0.0, |b| b.2) {
                    let threshold = (pairs[k].0 + pairs[k + 1].0) / 2.0;
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }
}

fn gini(n_pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = n_pos as f64 / n as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}
