//! Population Stability Index detector

use super::{DetectionInput, DetectorKind, MethodResult};
use crate::error::{DriftError, Result};
use crate::stats::{histogram, histogram_bin_edges};
use serde_json::json;
use std::collections::BTreeMap;

/// Added to every bin proportion so empty bins stay finite under the log
const PSI_EPSILON: f64 = 1e-4;

/// PSI of one column, binned on the reference range.
///
/// Current values outside the reference range fall in no bin.
pub fn column_psi(reference: &[f64], current: &[f64], n_bins: usize) -> Option<f64> {
    if current.is_empty() {
        return None;
    }
    let edges = histogram_bin_edges(reference, n_bins)?;
    let ref_counts = histogram(reference, &edges);
    let cur_counts = histogram(current, &edges);

    let n_ref = reference.len() as f64;
    let n_cur = current.len() as f64;

    let psi = ref_counts
        .iter()
        .zip(cur_counts.iter())
        .map(|(&r, &c)| {
            let r = r as f64 / n_ref + PSI_EPSILON;
            let c = c as f64 / n_cur + PSI_EPSILON;
            (c - r) * (c / r).ln()
        })
        .sum();
    Some(psi)
}

/// Severity band of a PSI value
fn severity(psi: f64, threshold: f64, severe: f64) -> &'static str {
    if psi > severe {
        "severe"
    } else if psi > threshold {
        "moderate"
    } else {
        "none"
    }
}

pub(crate) fn run(input: &DetectionInput<'_>) -> Result<MethodResult> {
    let columns = input.require_columns()?;
    let thresholds = &input.config.thresholds;

    let scores: BTreeMap<String, f64> = columns
        .iter()
        .filter_map(|name| {
            let reference = input.reference.non_missing(name);
            let current = input.current.non_missing(name);
            column_psi(&reference, &current, input.config.psi_bins).map(|psi| (name.clone(), psi))
        })
        .collect();

    if scores.is_empty() {
        return Err(DriftError::DataError(
            "no shared column has values on both sides".to_string(),
        ));
    }

    let drift_detected = scores.values().any(|&psi| psi > thresholds.psi);
    let max_psi = scores.values().copied().fold(0.0_f64, f64::max);
    let severities: BTreeMap<&str, &str> = scores
        .iter()
        .map(|(name, &psi)| (name.as_str(), severity(psi, thresholds.psi, thresholds.psi_severe)))
        .collect();

    Ok(MethodResult::new(DetectorKind::Psi, drift_detected, max_psi)
        .with_detail("psi_scores", json!(scores))
        .with_detail("severity", json!(severities))
        .with_detail("n_bins", input.config.psi_bins)
        .with_feature_scores(scores))
}
