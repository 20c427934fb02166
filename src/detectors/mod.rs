//! Drift detector runners
//!
//! The set of detectors is closed: [`DetectorKind`] enumerates them and each
//! variant has exactly one runner. Every runner reports through a
//! [`MethodResult`]; failures are recorded in its `error` field rather than
//! propagated, so the ensemble reduction always sees one result per method.

mod classifier;
mod ks;
mod mmd;
mod outlier;
mod psi;

use crate::config::DetectorConfig;
use crate::dataset::Dataset;
use crate::error::{DriftError, Result};
use crate::utils::Deadline;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, warn};

/// The drift detection methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Two-sample Kolmogorov-Smirnov test per column
    KsTest,
    /// Population Stability Index per column
    Psi,
    /// Maximum Mean Discrepancy with an RBF kernel
    Mmd,
    /// Isolation Forest anomaly ratio
    IsolationForest,
    /// Robust covariance envelope outlier ratio
    CovarianceDrift,
    /// Classifier two-sample test (needs a target column)
    ClassifierDrift,
}

impl DetectorKind {
    /// Every detector, in run order
    pub const ALL: [DetectorKind; 6] = [
        DetectorKind::KsTest,
        DetectorKind::Psi,
        DetectorKind::Mmd,
        DetectorKind::IsolationForest,
        DetectorKind::CovarianceDrift,
        DetectorKind::ClassifierDrift,
    ];

    /// Stable method name used in configs and results
    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::KsTest => "ks_test",
            DetectorKind::Psi => "psi",
            DetectorKind::Mmd => "mmd",
            DetectorKind::IsolationForest => "isolation_forest",
            DetectorKind::CovarianceDrift => "covariance_drift",
            DetectorKind::ClassifierDrift => "classifier_drift",
        }
    }

    /// Default ensemble weight
    pub fn default_weight(&self) -> f64 {
        match self {
            DetectorKind::KsTest => 0.20,
            DetectorKind::Psi => 0.25,
            DetectorKind::Mmd => 0.20,
            DetectorKind::IsolationForest => 0.15,
            DetectorKind::CovarianceDrift => 0.10,
            DetectorKind::ClassifierDrift => 0.10,
        }
    }

    /// Whether the method looks at the input feature distribution
    pub fn is_covariate(&self) -> bool {
        matches!(self, DetectorKind::KsTest | DetectorKind::Psi | DetectorKind::Mmd)
    }

    /// Whether the method is CPU-bound fitting subject to the time limit
    pub fn is_bounded(&self) -> bool {
        matches!(
            self,
            DetectorKind::IsolationForest | DetectorKind::CovarianceDrift | DetectorKind::ClassifierDrift
        )
    }

    /// Run this detector. Never fails: errors end up in the result.
    pub fn run(&self, input: &DetectionInput<'_>) -> MethodResult {
        let started = Instant::now();
        let deadline = if self.is_bounded() {
            Deadline::from_secs(input.config.timeout_secs)
        } else {
            Deadline::none()
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match self {
            DetectorKind::KsTest => ks::run(input),
            DetectorKind::Psi => psi::run(input),
            DetectorKind::Mmd => mmd::run(input),
            DetectorKind::IsolationForest => outlier::run_isolation_forest(input, &deadline),
            DetectorKind::CovarianceDrift => outlier::run_covariance(input, &deadline),
            DetectorKind::ClassifierDrift => classifier::run(input, &deadline),
        }))
        .unwrap_or_else(|payload| {
            let reason = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(DriftError::method(self.name(), format!("panicked: {}", reason)))
        });

        let mut result = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(method = self.name(), error = %err, "Drift method failed, excluded from vote");
                MethodResult::failed(*self, &err)
            }
        };
        result.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            method = self.name(),
            drift_detected = result.drift_detected,
            drift_score = result.drift_score,
            elapsed_ms = result.elapsed_ms,
            "Drift method finished"
        );
        result
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        DetectorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| DriftError::ConfigError(format!("unknown drift method '{}'", s)))
    }
}

/// Outcome of one detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResult {
    /// Method name
    pub method: String,
    /// Whether this method alone saw drift
    pub drift_detected: bool,
    /// Method-specific non-negative score
    pub drift_score: f64,
    /// Method-specific details (p-values, per-column scores, sizes)
    pub details: BTreeMap<String, Value>,
    /// Per-column scores, when the method computes them
    pub feature_scores: BTreeMap<String, f64>,
    /// Set when the method failed; such results do not vote
    pub error: Option<String>,
    /// Wall time spent in the method
    pub elapsed_ms: f64,
}

impl MethodResult {
    /// A successful result
    pub fn new(kind: DetectorKind, drift_detected: bool, drift_score: f64) -> Self {
        Self {
            method: kind.name().to_string(),
            drift_detected,
            drift_score: if drift_score.is_finite() { drift_score.max(0.0) } else { 0.0 },
            details: BTreeMap::new(),
            feature_scores: BTreeMap::new(),
            error: None,
            elapsed_ms: 0.0,
        }
    }

    /// A zero-score result carrying the failure
    pub fn failed(kind: DetectorKind, err: &DriftError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::new(kind, false, 0.0)
        }
    }

    /// Attach a detail value
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach per-column scores
    pub fn with_feature_scores(mut self, scores: BTreeMap<String, f64>) -> Self {
        self.feature_scores = scores;
        self
    }

    /// Whether the method ran to completion
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The detector this result came from
    pub fn kind(&self) -> Option<DetectorKind> {
        self.method.parse().ok()
    }
}

/// Inputs shared by every detector in one run
#[derive(Debug)]
pub struct DetectionInput<'a> {
    /// Reference data
    pub reference: &'a Dataset,
    /// Current data
    pub current: &'a Dataset,
    /// Label column, excluded from the classifier features
    pub target: Option<&'a str>,
    /// Configuration for this run
    pub config: &'a DetectorConfig,
    columns: Vec<String>,
}

impl<'a> DetectionInput<'a> {
    /// Prepare a run; resolves the columns both datasets share
    pub fn new(
        reference: &'a Dataset,
        current: &'a Dataset,
        target: Option<&'a str>,
        config: &'a DetectorConfig,
    ) -> Self {
        let columns = reference.shared_numeric_columns(current, None);
        Self {
            reference,
            current,
            target,
            config,
            columns,
        }
    }

    /// Numeric columns present in both datasets
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The shared columns, or a data error when there are none
    fn require_columns(&self) -> Result<&[String]> {
        if self.columns.is_empty() {
            return Err(DriftError::DataError("no shared numeric columns".to_string()));
        }
        Ok(&self.columns)
    }

    /// Reference and current matrices over `columns`, incomplete rows dropped
    fn matrices(&self, columns: &[String]) -> Result<(Array2<f64>, Array2<f64>)> {
        let reference = self.reference.to_matrix(columns)?;
        let current = self.current.to_matrix(columns)?;
        Ok((reference, current))
    }

    /// Detectors that apply to this run
    pub fn applicable_kinds(&self) -> Vec<DetectorKind> {
        DetectorKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.config.is_enabled(*kind))
            .filter(|kind| *kind != DetectorKind::ClassifierDrift || self.target.is_some())
            .collect()
    }
}

/// Run every applicable detector in parallel; results keep run order
pub fn run_all(input: &DetectionInput<'_>) -> Vec<MethodResult> {
    input
        .applicable_kinds()
        .par_iter()
        .map(|kind| kind.run(input))
        .collect()
}
