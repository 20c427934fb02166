//! Outlier-ratio detectors: fit an anomaly model on the reference data and
//! report the fraction of current rows it flags

use super::{DetectionInput, DetectorKind, MethodResult};
use crate::anomaly::{AnomalyDetector, EllipticEnvelope, IsolationForest};
use crate::error::{DriftError, Result};
use crate::utils::Deadline;

pub(crate) fn run_isolation_forest(input: &DetectionInput<'_>, deadline: &Deadline) -> Result<MethodResult> {
    let config = input.config;
    let model = IsolationForest::new()
        .with_n_estimators(config.isolation_trees)
        .with_contamination(config.contamination)
        .with_seed(config.seed);
    outlier_ratio(
        input,
        DetectorKind::IsolationForest,
        model,
        config.thresholds.isolation_forest,
        deadline,
    )
}

pub(crate) fn run_covariance(input: &DetectionInput<'_>, deadline: &Deadline) -> Result<MethodResult> {
    let config = input.config;
    let model = EllipticEnvelope::new()
        .with_contamination(config.contamination)
        .with_seed(config.seed);
    outlier_ratio(
        input,
        DetectorKind::CovarianceDrift,
        model,
        config.thresholds.covariance_drift,
        deadline,
    )
}

fn outlier_ratio<M: AnomalyDetector>(
    input: &DetectionInput<'_>,
    kind: DetectorKind,
    mut model: M,
    threshold: f64,
    deadline: &Deadline,
) -> Result<MethodResult> {
    let columns = input.require_columns()?;
    let (reference, current) = input.matrices(columns)?;
    if current.nrows() == 0 {
        return Err(DriftError::method(
            kind.name(),
            "current data has no complete rows over the shared columns",
        ));
    }

    model.fit_with_deadline(&reference, deadline)?;
    let fraction = model.outlier_fraction(&current)?;

    Ok(MethodResult::new(kind, fraction > threshold, fraction)
        .with_detail("outlier_fraction", fraction)
        .with_detail("threshold", threshold)
        .with_detail("n_reference", reference.nrows())
        .with_detail("n_current", current.nrows()))
}
