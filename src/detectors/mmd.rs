//! Maximum Mean Discrepancy detector

use super::{DetectionInput, DetectorKind, MethodResult};
use crate::error::{DriftError, Result};
use crate::stats::{rbf_kernel_mean, subsample_rows};
use ndarray::Array2;

/// Biased squared MMD estimate under an RBF kernel, floored at zero
pub fn mmd_rbf(reference: &Array2<f64>, current: &Array2<f64>, length_scale: f64) -> f64 {
    let k_rr = rbf_kernel_mean(reference, reference, length_scale);
    let k_cc = rbf_kernel_mean(current, current, length_scale);
    let k_rc = rbf_kernel_mean(reference, current, length_scale);
    (k_rr + k_cc - 2.0 * k_rc).max(0.0)
}

pub(crate) fn run(input: &DetectionInput<'_>) -> Result<MethodResult> {
    let columns = input.require_columns()?;
    let (reference, current) = input.matrices(columns)?;
    if reference.nrows() == 0 || current.nrows() == 0 {
        return Err(DriftError::method(
            DetectorKind::Mmd.name(),
            "no complete rows over the shared columns",
        ));
    }

    let config = input.config;
    let reference = subsample_rows(&reference, config.sample_cap, config.seed);
    let current = subsample_rows(&current, config.sample_cap, config.seed);

    let mmd = mmd_rbf(&reference, &current, config.mmd_length_scale);
    let drift_detected = mmd > config.thresholds.mmd;

    Ok(MethodResult::new(DetectorKind::Mmd, drift_detected, mmd)
        .with_detail("mmd", mmd)
        .with_detail("n_reference", reference.nrows())
        .with_detail("n_current", current.nrows())
        .with_detail("length_scale", config.mmd_length_scale))
}
