//! Tree-ensemble classifier used by the classifier two-sample test

mod cross_validation;
mod decision_tree;
mod random_forest;

pub use cross_validation::{CVSplit, StratifiedKFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForestClassifier};

use crate::error::{DriftError, Result};
use crate::stats::roc_auc;
use crate::utils::Deadline;
use ndarray::{Array1, Array2, Axis};

/// Stratified k-fold ROC AUC of a random forest.
///
/// Returns one AUC per fold.
pub fn cross_val_auc(
    x: &Array2<f64>,
    y: &Array1<f64>,
    n_folds: usize,
    n_estimators: usize,
    seed: u64,
    deadline: &Deadline,
) -> Result<Vec<f64>> {
    let splits = StratifiedKFold::new(n_folds).with_random_state(seed).split(y)?;

    splits
        .iter()
        .map(|split| {
            deadline.check("classifier_drift")?;

            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut forest = RandomForestClassifier::new(n_estimators)
                .with_random_state(seed.wrapping_add(split.fold_idx as u64 * 1000));
            forest.fit_with_deadline(&x_train, &y_train, deadline)?;
            let proba = forest.predict_proba(&x_test)?;

            roc_auc(&y_test.to_vec(), &proba.to_vec()).ok_or_else(|| {
                DriftError::ComputationError(format!(
                    "fold {} has a single class, AUC undefined",
                    split.fold_idx
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_val_auc_on_separable_data() {
        let x = Array2::from_shape_fn((60, 1), |(i, _)| if i < 30 { i as f64 } else { 100.0 + i as f64 });
        let y = Array1::from_shape_fn(60, |i| if i < 30 { 0.0 } else { 1.0 });

        let aucs = cross_val_auc(&x, &y, 5, 10, 42, &Deadline::none()).unwrap();
        assert_eq!(aucs.len(), 5);
        assert!(aucs.iter().all(|&a| a > 0.99));
    }
}
