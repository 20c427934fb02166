//! Two-sample Kolmogorov-Smirnov detector

use super::{DetectionInput, DetectorKind, MethodResult};
use crate::error::{DriftError, Result};
use crate::stats::ks_2samp;
use serde_json::json;
use std::collections::BTreeMap;

pub(crate) fn run(input: &DetectionInput<'_>) -> Result<MethodResult> {
    let columns = input.require_columns()?;
    let alpha = input.config.thresholds.ks_p_value;

    let mut statistics = BTreeMap::new();
    let mut p_values = BTreeMap::new();
    for name in columns {
        let reference = input.reference.non_missing(name);
        let current = input.current.non_missing(name);
        if let Some((statistic, p_value)) = ks_2samp(&reference, &current) {
            statistics.insert(name.clone(), statistic);
            p_values.insert(name.clone(), p_value);
        }
    }

    if statistics.is_empty() {
        return Err(DriftError::DataError(
            "no shared column has values on both sides".to_string(),
        ));
    }

    let drift_detected = p_values.values().any(|&p| p < alpha);
    let max_statistic = statistics.values().copied().fold(0.0_f64, f64::max);

    Ok(MethodResult::new(DetectorKind::KsTest, drift_detected, max_statistic)
        .with_detail("p_values", json!(p_values))
        .with_detail("statistics", json!(statistics))
        .with_detail("alpha", alpha)
        .with_feature_scores(statistics))
}
