//! Classifier two-sample test.
//!
//! Reference rows are labelled 0 and current rows 1; a random forest is
//! cross-validated on telling them apart. A mean AUC near 0.5 means the two
//! samples are indistinguishable; a high AUC means the joint distribution of
//! the features moved. The target column is left out of the features.

use super::{DetectionInput, DetectorKind, MethodResult};
use crate::classifier::cross_val_auc;
use crate::error::{DriftError, Result};
use crate::utils::Deadline;
use ndarray::{concatenate, Array1, Axis};

pub(crate) fn run(input: &DetectionInput<'_>, deadline: &Deadline) -> Result<MethodResult> {
    let target = input
        .target
        .ok_or_else(|| DriftError::method(DetectorKind::ClassifierDrift.name(), "no target column supplied"))?;
    if input.reference.column(target).is_none() {
        return Err(DriftError::DataError(format!(
            "target column '{}' not found in reference data",
            target
        )));
    }

    let features = input.reference.shared_numeric_columns(input.current, Some(target));
    if features.is_empty() {
        return Err(DriftError::DataError(
            "no shared feature columns besides the target".to_string(),
        ));
    }

    let (reference, current) = input.matrices(&features)?;
    let n_ref = reference.nrows();
    let n_cur = current.nrows();

    let x = concatenate(Axis(0), &[reference.view(), current.view()])?;
    let y = Array1::from_shape_fn(n_ref + n_cur, |i| if i < n_ref { 0.0 } else { 1.0 });

    let config = input.config;
    let aucs = cross_val_auc(
        &x,
        &y,
        config.cv_folds,
        config.classifier_trees,
        config.seed,
        deadline,
    )?;
    let mean_auc = aucs.iter().sum::<f64>() / aucs.len() as f64;
    let drift_detected = mean_auc > config.thresholds.classifier_auc;

    Ok(MethodResult::new(DetectorKind::ClassifierDrift, drift_detected, mean_auc)
        .with_detail("mean_auc", mean_auc)
        .with_detail("fold_aucs", aucs)
        .with_detail("n_features", features.len())
        .with_detail("n_reference", n_ref)
        .with_detail("n_current", n_cur))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::dataset::Dataset;

    fn dataset(offset: f64) -> Dataset {
        Dataset::from_columns(vec![
            ("x", (0..60).map(|i| offset + (i % 10) as f64).collect()),
            ("label", (0..60).map(|i| (i % 2) as f64).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn test_separable_samples_have_high_auc() {
        let reference = dataset(0.0);
        let current = dataset(100.0);
        let config = DetectorConfig::default();
        let input = DetectionInput::new(&reference, &current, Some("label"), &config);

        let result = run(&input, &Deadline::none()).unwrap();
        assert!(result.drift_detected);
        assert!(result.drift_score > 0.99);
    }

    #[test]
    fn test_target_only_dataset_fails() {
        let only_target = Dataset::from_columns(vec![("label", (0..20).map(|i| (i % 2) as f64).collect())]).unwrap();
        let config = DetectorConfig::default();
        let input = DetectionInput::new(&only_target, &only_target, Some("label"), &config);

        assert!(matches!(run(&input, &Deadline::none()), Err(DriftError::DataError(_))));
    }

    #[test]
    fn test_missing_target_column_fails() {
        let reference = dataset(0.0);
        let config = DetectorConfig::default();
        let input = DetectionInput::new(&reference, &reference, Some("churned"), &config);

        assert!(run(&input, &Deadline::none()).is_err());
    }
}
