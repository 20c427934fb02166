//! Integration test: ensemble behaviour on synthetic reference/current pairs

use kolosal_drift::detectors::{DetectorKind, MethodResult};
use kolosal_drift::drift::{aggregate, detect, DriftResult, DriftType};
use kolosal_drift::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

fn normal_column(n: usize, mean: f64, std: f64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dist = Normal::new(mean, std).unwrap();
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

fn method<'a>(result: &'a DriftResult, kind: DetectorKind) -> &'a MethodResult {
    result
        .method(kind)
        .unwrap_or_else(|| panic!("{} missing from per_method", kind))
}

fn multi_feature(seed: u64) -> Dataset {
    Dataset::from_columns(vec![
        ("age", normal_column(500, 40.0, 10.0, seed)),
        ("income", normal_column(500, 5.0, 2.0, seed + 1)),
        ("score", normal_column(500, 0.0, 1.0, seed + 2)),
    ])
    .unwrap()
}

#[test]
fn test_identity_has_no_drift() {
    let data = multi_feature(11);
    let result = detect(&data, &data, None, &DetectorConfig::default()).unwrap();

    assert!(!result.drift_detected);
    assert!(!result.all_methods_failed);
    assert_eq!(result.drift_type, DriftType::NoDrift);
    assert!(result.drift_score < 0.05, "score = {}", result.drift_score);
    assert!(result.features_affected.is_empty());
    assert_eq!(result.per_method.len(), 5);

    for kind in [DetectorKind::KsTest, DetectorKind::Psi, DetectorKind::Mmd] {
        let r = method(&result, kind);
        assert!(r.error.is_none());
        assert!(r.drift_score < 1e-9, "{} = {}", kind, r.drift_score);
    }
    for kind in [DetectorKind::IsolationForest, DetectorKind::CovarianceDrift] {
        let r = method(&result, kind);
        assert!(r.error.is_none(), "{}: {:?}", kind, r.error);
        assert!(r.drift_score <= 0.1 + 1e-9, "{} = {}", kind, r.drift_score);
        assert!(!r.drift_detected);
    }
}

#[test]
fn test_identity_with_target_classifier_stays_quiet() {
    let mut columns = vec![
        ("f1", normal_column(200, 0.0, 1.0, 3)),
        ("f2", normal_column(200, 1.0, 2.0, 4)),
    ];
    columns.push(("label", (0..200).map(|i| (i % 2) as f64).collect()));
    let data = Dataset::from_columns(columns).unwrap();

    let result = detect(&data, &data, Some("label"), &DetectorConfig::default()).unwrap();
    let classifier = method(&result, DetectorKind::ClassifierDrift);

    assert!(classifier.error.is_none(), "{:?}", classifier.error);
    assert!(!classifier.drift_detected, "auc = {}", classifier.drift_score);
    assert!(!result.drift_detected);
    assert_eq!(result.drift_type, DriftType::NoDrift);
}

#[test]
fn test_scenario_identical_draw() {
    let reference = Dataset::from_columns(vec![("feature_x", normal_column(1000, 0.0, 1.0, 42))]).unwrap();
    let current = Dataset::from_columns(vec![("feature_x", normal_column(1000, 0.0, 1.0, 42))]).unwrap();

    let result = detect(&reference, &current, None, &DetectorConfig::default()).unwrap();

    assert_eq!(result.drift_type, DriftType::NoDrift);
    assert!(!result.drift_detected);
    assert_eq!(result.status(), "NO_DRIFT");
}

#[test]
fn test_scenario_mean_shift() {
    let reference = Dataset::from_columns(vec![("feature_x", normal_column(1000, 0.0, 1.0, 1))]).unwrap();
    let current = Dataset::from_columns(vec![("feature_x", normal_column(1000, 3.0, 1.0, 2))]).unwrap();

    let result = detect(&reference, &current, None, &DetectorConfig::default()).unwrap();

    assert!(result.drift_detected);
    assert!(result.drift_type.has_covariate());
    assert!(result.features_affected.contains(&"feature_x".to_string()));
    assert!(method(&result, DetectorKind::KsTest).drift_detected);
    assert!(method(&result, DetectorKind::Psi).drift_detected);
    assert!(method(&result, DetectorKind::Mmd).drift_detected);
    assert!(result.per_feature_scores["feature_x"] > 0.25);
    assert_eq!(result.confidence, result.drift_score.min(1.0));
}

#[test]
fn test_scenario_concept_drift_only() {
    // Same marginals on both sides; only the pairing of x1 and x2 flips,
    // which a classifier on (x1, x2) can learn.
    let n = 300;
    let x1: Vec<f64> = (0..n).map(|i| i as f64 * 5.0).collect();
    let low_half = |i: usize| i < n / 2;
    let reference = Dataset::from_columns(vec![
        ("x1", x1.clone()),
        ("x2", (0..n).map(|i| if low_half(i) { 1.0 } else { 0.0 }).collect()),
        ("label", (0..n).map(|i| (i % 2) as f64).collect()),
    ])
    .unwrap();
    let current = Dataset::from_columns(vec![
        ("x1", x1),
        ("x2", (0..n).map(|i| if low_half(i) { 0.0 } else { 1.0 }).collect()),
        ("label", (0..n).map(|i| (i % 2) as f64).collect()),
    ])
    .unwrap();

    let result = detect(&reference, &current, Some("label"), &DetectorConfig::default()).unwrap();

    for kind in [DetectorKind::KsTest, DetectorKind::Psi, DetectorKind::Mmd] {
        let r = method(&result, kind);
        assert!(r.error.is_none());
        assert!(!r.drift_detected, "{} fired with {}", kind, r.drift_score);
    }
    let classifier = method(&result, DetectorKind::ClassifierDrift);
    assert!(classifier.drift_detected, "auc = {}", classifier.drift_score);
    assert_eq!(result.drift_type, DriftType::ConceptDrift);
    assert!(result.features_affected.is_empty());
}

#[test]
fn test_ks_and_psi_grow_with_scale_factor() {
    let base = Dataset::from_columns(vec![("x", normal_column(1000, 0.0, 1.0, 5))]).unwrap();
    let config = DetectorConfig::default();

    let mut last_ks = 0.0;
    let mut last_psi = 0.0;
    let mut last_result = None;
    for k in [1.25, 1.5, 2.0, 3.0] {
        let reference = base.map_column("x", |v| v * k).unwrap();
        let result = detect(&reference, &base, None, &config).unwrap();

        let ks = method(&result, DetectorKind::KsTest).drift_score;
        let psi = method(&result, DetectorKind::Psi).drift_score;
        assert!(ks > last_ks, "k = {}: ks {} <= {}", k, ks, last_ks);
        assert!(psi > last_psi, "k = {}: psi {} <= {}", k, psi, last_psi);
        last_ks = ks;
        last_psi = psi;
        last_result = Some(result);
    }

    // at k = 3 both tests are past their thresholds
    let widest = last_result.unwrap();
    assert!(method(&widest, DetectorKind::KsTest).drift_detected);
    assert!(method(&widest, DetectorKind::Psi).drift_detected);
    assert!(last_psi > config.thresholds.psi);
}

#[test]
fn test_zero_weight_method_never_changes_decision() {
    let reference = Dataset::from_columns(vec![("x", normal_column(600, 0.0, 1.0, 8))]).unwrap();
    let current = Dataset::from_columns(vec![("x", normal_column(600, 0.4, 1.0, 9))]).unwrap();
    let config = DetectorConfig::default().with_weight("psi", 0.0);

    let result = detect(&reference, &current, None, &config).unwrap();

    for flipped_detection in [true, false] {
        let mut per_method = result.per_method.clone();
        for r in per_method.iter_mut().filter(|r| r.method == "psi") {
            r.drift_detected = flipped_detection;
            r.drift_score = if flipped_detection { 10.0 } else { 0.0 };
        }
        let replay = aggregate(per_method, &config);
        assert_eq!(replay.drift_detected, result.drift_detected);
        assert!((replay.drift_score - result.drift_score).abs() < 1e-12);
    }
}

#[test]
fn test_singular_reference_degrades_gracefully() {
    let n = 300;
    let reference = Dataset::from_columns(vec![
        ("x", normal_column(n, 0.0, 1.0, 21)),
        ("constant", vec![1.0; n]),
    ])
    .unwrap();
    let current = Dataset::from_columns(vec![
        ("x", normal_column(n, 0.0, 1.0, 22)),
        ("constant", vec![1.0; n]),
    ])
    .unwrap();

    let result = detect(&reference, &current, None, &DetectorConfig::default()).unwrap();

    let covariance = method(&result, DetectorKind::CovarianceDrift);
    assert!(covariance.error.is_some());
    assert_eq!(covariance.drift_score, 0.0);
    assert!(!covariance.drift_detected);

    assert!(!result.all_methods_failed);
    assert!(method(&result, DetectorKind::KsTest).error.is_none());
    assert!(method(&result, DetectorKind::IsolationForest).error.is_none());
    assert_eq!(result.per_method.len(), 5);
}

#[test]
fn test_no_shared_columns_all_methods_fail() {
    let reference = Dataset::from_columns(vec![("a", normal_column(50, 0.0, 1.0, 1))]).unwrap();
    let current = Dataset::from_columns(vec![("b", normal_column(50, 0.0, 1.0, 2))]).unwrap();

    let result = detect(&reference, &current, None, &DetectorConfig::default()).unwrap();

    assert!(result.all_methods_failed);
    assert!(!result.drift_detected);
    assert_eq!(result.drift_score, 0.0);
    assert_eq!(result.status(), "EVALUATION_FAILED");
    assert!(result.per_method.iter().all(|r| r.error.is_some()));
}

#[test]
fn test_zero_timeout_fails_only_bounded_methods() {
    let data = multi_feature(31);
    let config = DetectorConfig::default().with_timeout_secs(Some(0.0));

    let result = detect(&data, &data, None, &config).unwrap();

    for kind in [DetectorKind::IsolationForest, DetectorKind::CovarianceDrift] {
        let err = method(&result, kind).error.as_deref().unwrap_or_default();
        assert!(err.contains("timed out"), "{}: {}", kind, err);
    }
    for kind in [DetectorKind::KsTest, DetectorKind::Psi, DetectorKind::Mmd] {
        assert!(method(&result, kind).error.is_none());
    }
    assert!(!result.all_methods_failed);
}

#[test]
fn test_disabled_methods_are_skipped() {
    let data = multi_feature(41);
    let config = DetectorConfig::default()
        .disable(DetectorKind::IsolationForest)
        .disable(DetectorKind::CovarianceDrift);

    let result = detect(&data, &data, None, &config).unwrap();

    assert_eq!(result.per_method.len(), 3);
    assert!(result.method(DetectorKind::IsolationForest).is_none());
}

#[test]
fn test_missing_values_are_ignored() {
    let mut values = normal_column(400, 0.0, 1.0, 51);
    for v in values.iter_mut().step_by(7) {
        *v = f64::NAN;
    }
    let data = Dataset::from_columns(vec![
        ("x", values),
        ("y", normal_column(400, 2.0, 1.0, 52)),
    ])
    .unwrap();

    let result = detect(&data, &data, None, &DetectorConfig::default()).unwrap();
    assert!(!result.drift_detected);
    assert!(result.per_method.iter().all(|r| r.error.is_none()));
}

#[test]
fn test_result_serializes_to_json() {
    let data = multi_feature(61);
    let result = detect(&data, &data, None, &DetectorConfig::default()).unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["drift_type"], "no_drift");
    assert_eq!(value["per_method"][0]["method"], "ks_test");
    assert!(value["per_method"][0]["details"]["p_values"].is_object());
}

#[test]
fn test_extreme_magnitudes_do_not_abort_detection() {
    let values: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1e308 } else { -1e308 }).collect();
    let data = Dataset::from_columns(vec![("x", values)]).unwrap();

    let result = detect(&data, &data, None, &DetectorConfig::default()).unwrap();

    assert_eq!(result.per_method.len(), 5);
    assert!(method(&result, DetectorKind::IsolationForest).error.is_none());
    assert!(!result.all_methods_failed);
}
