//! Ensemble drift detection
//!
//! [`detect`] runs every enabled detector over a reference and a current
//! dataset, then reduces their outcomes with a weighted vote into a single
//! [`DriftResult`].

mod ensemble;

pub use ensemble::{aggregate, classify_drift_type, VOTE_THRESHOLD};

use crate::config::DetectorConfig;
use crate::dataset::Dataset;
use crate::detectors::{run_all, DetectionInput, DetectorKind, MethodResult};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// Ensemble score above which a detected drift is reported as high
pub const HIGH_DRIFT_SCORE: f64 = 0.8;

/// Which method families saw drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    NoDrift,
    CovariateDrift,
    ConceptDrift,
    CovariateAndConceptDrift,
}

impl DriftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftType::NoDrift => "no_drift",
            DriftType::CovariateDrift => "covariate_drift",
            DriftType::ConceptDrift => "concept_drift",
            DriftType::CovariateAndConceptDrift => "covariate_and_concept_drift",
        }
    }

    /// Whether the input distribution moved
    pub fn has_covariate(&self) -> bool {
        matches!(self, DriftType::CovariateDrift | DriftType::CovariateAndConceptDrift)
    }

    /// Whether the reference/current boundary became learnable
    pub fn has_concept(&self) -> bool {
        matches!(self, DriftType::ConceptDrift | DriftType::CovariateAndConceptDrift)
    }
}

impl fmt::Display for DriftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ensemble drift decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftResult {
    /// Whether the weighted vote declared drift
    pub drift_detected: bool,
    /// Weighted mean of method scores; not capped
    pub drift_score: f64,
    /// Which families fired
    pub drift_type: DriftType,
    /// Columns whose PSI exceeds the PSI threshold, sorted
    pub features_affected: Vec<String>,
    /// `drift_score` clamped to [0, 1]
    pub confidence: f64,
    /// Every method that ran, failed ones included
    pub per_method: Vec<MethodResult>,
    /// Column to PSI
    pub per_feature_scores: BTreeMap<String, f64>,
    /// No method produced a usable result
    pub all_methods_failed: bool,
}

impl DriftResult {
    /// Result of one method, if it ran
    pub fn method(&self, kind: DetectorKind) -> Option<&MethodResult> {
        self.per_method.iter().find(|r| r.method == kind.name())
    }

    /// Methods that failed
    pub fn failed_methods(&self) -> Vec<&MethodResult> {
        self.per_method.iter().filter(|r| !r.is_ok()).collect()
    }

    /// Qualitative status tag
    pub fn status(&self) -> &'static str {
        if self.all_methods_failed {
            "EVALUATION_FAILED"
        } else if !self.drift_detected {
            "NO_DRIFT"
        } else if self.drift_score > HIGH_DRIFT_SCORE {
            "HIGH_DRIFT"
        } else {
            "DRIFT"
        }
    }

    /// Multi-line human readable summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("Drift Report\n");
        s.push_str("============\n");
        s.push_str(&format!("Status: {}\n", self.status()));
        s.push_str(&format!("Drift type: {}\n", self.drift_type));
        s.push_str(&format!("Score: {:.4} (confidence {:.4})\n", self.drift_score, self.confidence));

        s.push_str("\nMethods:\n");
        for r in &self.per_method {
            match &r.error {
                Some(err) => s.push_str(&format!("  - {:<18} FAILED: {}\n", r.method, err)),
                None => s.push_str(&format!(
                    "  - {:<18} score {:.4}{}\n",
                    r.method,
                    r.drift_score,
                    if r.drift_detected { "  [drift]" } else { "" }
                )),
            }
        }

        if !self.features_affected.is_empty() {
            s.push_str(&format!("\nFeatures affected: {}\n", self.features_affected.join(", ")));
        }
        s
    }
}

/// Run the detector ensemble over two datasets.
///
/// Only an invalid `config` is an error; every detector failure is recorded
/// in its [`MethodResult`] instead.
pub fn detect(
    reference: &Dataset,
    current: &Dataset,
    target: Option<&str>,
    config: &DetectorConfig,
) -> Result<DriftResult> {
    config.validate()?;
    let started = Instant::now();

    let input = DetectionInput::new(reference, current, target, config);
    debug!(
        n_reference = reference.n_rows(),
        n_current = current.n_rows(),
        shared_columns = input.columns().len(),
        target = target.unwrap_or("-"),
        "Running drift detectors"
    );

    let result = aggregate(run_all(&input), config);

    debug!(
        drift_detected = result.drift_detected,
        drift_score = result.drift_score,
        drift_type = %result.drift_type,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "Drift ensemble finished"
    );
    Ok(result)
}
