//! Isolation Forest anomaly detection

use crate::anomaly::AnomalyDetector;
use crate::error::{DriftError, Result};
use crate::utils::{cmp_f64, Deadline};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
    },
}

impl IsolationTree {
    /// Build an isolation tree over the given row indices
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        let feature = rng.gen_range(0..x.ncols());

        let (min_val, max_val) = indices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
        );

        // Constant feature in this node
        if (max_val - min_val).abs() < 1e-10 {
            return IsolationTree::External { size: n_samples };
        }

        // Convex combination stays finite even when max_val - min_val overflows
        let u: f64 = rng.gen();
        let threshold = min_val * (1.0 - u) + max_val * u;
        if !threshold.is_finite() {
            return IsolationTree::External { size: n_samples };
        }

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Path length for a sample, with the unbuilt-subtree adjustment at leaves
    pub fn path_length(&self, sample: &[f64], current_height: usize) -> f64 {
        match self {
            IsolationTree::External { size } => current_height as f64 + Self::c(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }

    /// Average path length of an unsuccessful BST search over `n` points:
    /// c(n) = 2 H(n-1) - 2(n-1)/n
    fn c(n: usize) -> f64 {
        match n {
            0 | 1 => 0.0,
            2 => 1.0,
            _ => {
                let n_f = n as f64;
                2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
            }
        }
    }
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Maximum samples per tree
    max_samples: usize,
    /// Expected proportion of outliers in the training data
    contamination: f64,
    /// Random seed
    seed: u64,
    /// Fitted trees
    trees: Option<Vec<IsolationTree>>,
    /// Score above which a row is anomalous
    threshold: Option<f64>,
    /// Subsample size used per tree
    n_samples: Option<usize>,
}

impl IsolationForest {
    /// Create new Isolation Forest
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
            trees: None,
            threshold: None,
            n_samples: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set maximum samples per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n.max(2);
        self
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c.clamp(0.0, 0.5);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Anomaly score in (0, 1]; higher means more anomalous
    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(DriftError::ModelNotFitted)?;
        let c_n = IsolationTree::c(self.n_samples.unwrap_or(self.max_samples)).max(f64::EPSILON);

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample: Vec<f64> = x.row(i).to_vec();
                let avg_path_length = trees
                    .iter()
                    .map(|tree| tree.path_length(&sample, 0))
                    .sum::<f64>()
                    / trees.len() as f64;

                // s(x, n) = 2^(-E[h(x)] / c(n))
                2.0_f64.powf(-avg_path_length / c_n)
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit_with_deadline(&mut self, x: &Array2<f64>, deadline: &Deadline) -> Result<()> {
        let n_samples = x.nrows();
        if x.ncols() == 0 {
            return Err(DriftError::ValidationError(
                "isolation forest needs at least one feature".to_string(),
            ));
        }
        if n_samples < 2 {
            return Err(DriftError::ValidationError(format!(
                "isolation forest needs at least 2 rows, got {}",
                n_samples
            )));
        }

        let samples_per_tree = self.max_samples.min(n_samples);
        let max_height = (samples_per_tree as f64).log2().ceil() as usize;

        // One seed per tree keeps the forest reproducible under parallel builds
        let seed = self.seed;
        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| -> Result<IsolationTree> {
                deadline.check("isolation_forest")?;
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64));
                let indices: Vec<usize> =
                    rand::seq::index::sample(&mut rng, n_samples, samples_per_tree).into_vec();
                Ok(IsolationTree::build(x, &indices, 0, max_height, &mut rng))
            })
            .collect::<Result<_>>()?;

        self.trees = Some(trees);
        self.n_samples = Some(samples_per_tree);

        let mut sorted_scores = self.compute_scores(x)?.to_vec();
        sorted_scores.sort_by(|a, b| cmp_f64(b, a));

        let threshold_idx = ((self.contamination * n_samples as f64) as usize).min(n_samples - 1);
        self.threshold = Some(sorted_scores[threshold_idx]);

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_data() -> Array2<f64> {
        let mut data = Vec::new();
        for i in 0..50 {
            data.push((i % 10) as f64);
            data.push(((i % 10) + 1) as f64);
        }
        data.extend_from_slice(&[100.0, 100.0]);
        data.extend_from_slice(&[-50.0, -50.0]);
        Array2::from_shape_vec((52, 2), data).unwrap()
    }

    #[test]
    fn test_isolation_forest_scores_outliers_higher() {
        let x = clustered_data();
        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(0.05)
            .with_seed(42);

        iforest.fit(&x).unwrap();
        let scores = iforest.score_samples(&x).unwrap();
        let labels = iforest.predict(&x).unwrap();

        assert!(scores[50] > scores[0]);
        assert!(scores[51] > scores[0]);
        assert_eq!(labels[50], -1);
        assert_eq!(labels[51], -1);
    }

    #[test]
    fn test_extreme_finite_values_build_trees() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| if i % 2 == 0 { 1e308 } else { -1e308 });
        let mut iforest = IsolationForest::new().with_n_estimators(20).with_seed(3);
        iforest.fit(&x).unwrap();

        let scores = iforest.score_samples(&x).unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_same_data_flags_contamination_share() {
        let x = Array2::from_shape_fn((200, 2), |(i, j)| ((i * 7 + j * 13) % 31) as f64);
        let mut iforest = IsolationForest::new().with_seed(7);
        iforest.fit(&x).unwrap();

        let fraction = iforest.outlier_fraction(&x).unwrap();
        assert!(fraction <= 0.15, "fraction = {}", fraction);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let x = clustered_data();
        let mut a = IsolationForest::new().with_seed(3);
        let mut b = IsolationForest::new().with_seed(3);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.score_samples(&x).unwrap(), b.score_samples(&x).unwrap());
    }

    #[test]
    fn test_unfitted_model_errors() {
        let iforest = IsolationForest::new();
        let x = clustered_data();
        assert!(matches!(iforest.score_samples(&x), Err(DriftError::ModelNotFitted)));
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let x = clustered_data();
        let mut iforest = IsolationForest::new();
        let deadline = Deadline::after(std::time::Duration::ZERO);
        let result = iforest.fit_with_deadline(&x, &deadline);
        assert!(matches!(result, Err(DriftError::Timeout { .. })));
    }

    #[test]
    fn test_isolation_tree_path_length() {
        let x = Array2::from_shape_fn((10, 2), |(i, _)| (i + 1) as f64);
        let indices: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let tree = IsolationTree::build(&x, &indices, 0, 10, &mut rng);
        assert!(tree.path_length(&[5.0, 5.0], 0) > 0.0);
    }
}
