//! Weighted-vote reduction of detector outcomes

use super::{DriftResult, DriftType};
use crate::config::DetectorConfig;
use crate::detectors::{DetectorKind, MethodResult};
use std::collections::{BTreeMap, BTreeSet};

/// Vote mass above which the ensemble declares drift.
///
/// Compared against the raw sum of detecting weights; weights are not
/// normalised first.
pub const VOTE_THRESHOLD: f64 = 0.5;

/// Combine per-method results into one decision.
///
/// Failed methods are kept in `per_method` but contribute neither votes nor
/// weight. Pure and total: any input yields a result.
pub fn aggregate(per_method: Vec<MethodResult>, config: &DetectorConfig) -> DriftResult {
    let mut drift_votes = 0.0;
    let mut weighted_score = 0.0;
    let mut total_weight = 0.0;

    for result in per_method.iter().filter(|r| r.is_ok()) {
        let weight = config.weight_for(&result.method);
        if result.drift_detected {
            drift_votes += weight;
        }
        weighted_score += result.drift_score * weight;
        total_weight += weight;
    }

    let all_methods_failed = per_method.iter().all(|r| !r.is_ok());
    let drift_score = if total_weight > 0.0 {
        weighted_score / total_weight
    } else {
        0.0
    };
    let drift_detected = !all_methods_failed && drift_votes > VOTE_THRESHOLD;

    let per_feature_scores = feature_scores(&per_method);
    let features_affected: BTreeSet<String> = per_feature_scores
        .iter()
        .filter(|(_, &psi)| psi > config.thresholds.psi)
        .map(|(name, _)| name.clone())
        .collect();

    DriftResult {
        drift_detected,
        drift_score,
        drift_type: classify_drift_type(&per_method),
        features_affected: features_affected.into_iter().collect(),
        confidence: drift_score.clamp(0.0, 1.0),
        per_feature_scores,
        all_methods_failed,
        per_method,
    }
}

/// Per-column PSI of a successful PSI run, empty otherwise
fn feature_scores(per_method: &[MethodResult]) -> BTreeMap<String, f64> {
    per_method
        .iter()
        .find(|r| r.is_ok() && r.kind() == Some(DetectorKind::Psi))
        .map(|r| r.feature_scores.clone())
        .unwrap_or_default()
}

/// Label which method families fired, regardless of the ensemble vote
pub fn classify_drift_type(per_method: &[MethodResult]) -> DriftType {
    let fired = |r: &&MethodResult| r.is_ok() && r.drift_detected;

    let covariate = per_method
        .iter()
        .filter(fired)
        .any(|r| r.kind().map_or(false, |k| k.is_covariate()));
    let concept = per_method
        .iter()
        .filter(fired)
        .any(|r| r.kind() == Some(DetectorKind::ClassifierDrift));

    match (covariate, concept) {
        (true, true) => DriftType::CovariateAndConceptDrift,
        (true, false) => DriftType::CovariateDrift,
        (false, true) => DriftType::ConceptDrift,
        (false, false) => DriftType::NoDrift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;

    fn result(kind: DetectorKind, detected: bool, score: f64) -> MethodResult {
        MethodResult::new(kind, detected, score)
    }

    #[test]
    fn test_weighted_score_and_vote() {
        let config = DetectorConfig::default();
        let results = vec![
            result(DetectorKind::KsTest, true, 0.8),
            result(DetectorKind::Psi, true, 0.4),
            result(DetectorKind::Mmd, true, 0.2),
            result(DetectorKind::IsolationForest, false, 0.05),
        ];
        let out = aggregate(results, &config);

        // votes 0.20 + 0.25 + 0.20 = 0.65
        assert!(out.drift_detected);
        let expected = (0.8 * 0.20 + 0.4 * 0.25 + 0.2 * 0.20 + 0.05 * 0.15) / 0.80;
        assert!((out.drift_score - expected).abs() < 1e-12);
        assert_eq!(out.confidence, out.drift_score);
        assert_eq!(out.drift_type, DriftType::CovariateDrift);
    }

    #[test]
    fn test_vote_threshold_is_strict() {
        let config = DetectorConfig::default()
            .with_weight("ks_test", 0.25)
            .with_weight("psi", 0.25);
        let results = vec![
            result(DetectorKind::KsTest, true, 0.3),
            result(DetectorKind::Psi, true, 0.3),
            result(DetectorKind::Mmd, false, 0.0),
        ];
        assert!(!aggregate(results, &config).drift_detected);
    }

    #[test]
    fn test_failed_methods_do_not_vote() {
        let config = DetectorConfig::default();
        let err = DriftError::ComputationError("covariance matrix is singular".to_string());
        let results = vec![
            result(DetectorKind::KsTest, false, 0.1),
            MethodResult::failed(DetectorKind::CovarianceDrift, &err),
        ];
        let out = aggregate(results, &config);

        assert!((out.drift_score - 0.1).abs() < 1e-12);
        assert!(!out.all_methods_failed);
        assert_eq!(out.per_method.len(), 2);
    }

    #[test]
    fn test_all_failed() {
        let config = DetectorConfig::default();
        let err = DriftError::DataError("no shared numeric columns".to_string());
        let results = DetectorKind::ALL
            .iter()
            .map(|&k| MethodResult::failed(k, &err))
            .collect();
        let out = aggregate(results, &config);

        assert!(out.all_methods_failed);
        assert!(!out.drift_detected);
        assert_eq!(out.drift_score, 0.0);
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.drift_type, DriftType::NoDrift);
    }

    #[test]
    fn test_confidence_capped_at_one() {
        let config = DetectorConfig::default();
        let out = aggregate(vec![result(DetectorKind::Psi, true, 4.2)], &config);
        assert_eq!(out.drift_score, 4.2);
        assert_eq!(out.confidence, 1.0);
    }

    #[test]
    fn test_features_affected_from_psi() {
        let config = DetectorConfig::default();
        let scores: BTreeMap<String, f64> = [("b".to_string(), 0.3), ("a".to_string(), 0.05), ("c".to_string(), 0.12)]
            .into_iter()
            .collect();
        let psi = result(DetectorKind::Psi, true, 0.3).with_feature_scores(scores);
        let out = aggregate(vec![psi], &config);

        assert_eq!(out.features_affected, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(out.per_feature_scores.len(), 3);
    }

    #[test]
    fn test_drift_type_families() {
        let concept = vec![
            result(DetectorKind::KsTest, false, 0.0),
            result(DetectorKind::ClassifierDrift, true, 0.9),
        ];
        assert_eq!(classify_drift_type(&concept), DriftType::ConceptDrift);

        let both = vec![
            result(DetectorKind::Mmd, true, 0.2),
            result(DetectorKind::ClassifierDrift, true, 0.9),
        ];
        assert_eq!(classify_drift_type(&both), DriftType::CovariateAndConceptDrift);

        // outlier-ratio methods are not a covariate family
        let outliers = vec![result(DetectorKind::IsolationForest, true, 0.5)];
        assert_eq!(classify_drift_type(&outliers), DriftType::NoDrift);
    }
}
