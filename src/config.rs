//! Detector and service configuration

use crate::detectors::DetectorKind;
use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Weight given to a method that has no configured weight
pub const UNKNOWN_METHOD_WEIGHT: f64 = 0.1;

/// Per-method decision thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// KS test: drift when any column's p-value is below this
    pub ks_p_value: f64,
    /// PSI: drift when any column exceeds this
    pub psi: f64,
    /// PSI above this is reported as severe
    pub psi_severe: f64,
    /// MMD: drift when the discrepancy exceeds this
    pub mmd: f64,
    /// Isolation forest: drift when the anomaly fraction exceeds this
    pub isolation_forest: f64,
    /// Covariance envelope: drift when the outlier fraction exceeds this
    pub covariance_drift: f64,
    /// Classifier two-sample test: drift when mean AUC exceeds this
    pub classifier_auc: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ks_p_value: 0.05,
            psi: 0.1,
            psi_severe: 0.25,
            mmd: 0.05,
            isolation_forest: 0.15,
            covariance_drift: 0.2,
            classifier_auc: 0.7,
        }
    }
}

/// Configuration for one model's detector ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Method name to voting weight; weights need not sum to one
    pub weights: BTreeMap<String, f64>,
    /// Decision thresholds
    pub thresholds: Thresholds,
    /// Row cap for the kernel method
    pub sample_cap: usize,
    /// Seed for every randomized method
    pub seed: u64,
    /// Methods that are never run
    pub disabled: BTreeSet<DetectorKind>,
    /// Time limit in seconds for each CPU-bound method (None = unbounded)
    pub timeout_secs: Option<f64>,
    /// Number of PSI histogram bins
    pub psi_bins: usize,
    /// RBF kernel length scale for MMD
    pub mmd_length_scale: f64,
    /// Expected outlier fraction for the anomaly detectors
    pub contamination: f64,
    /// Trees in the isolation forest
    pub isolation_trees: usize,
    /// Trees in the two-sample classifier forest
    pub classifier_trees: usize,
    /// Folds for the classifier cross-validation
    pub cv_folds: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let weights = DetectorKind::ALL
            .iter()
            .map(|kind| (kind.name().to_string(), kind.default_weight()))
            .collect();

        Self {
            weights,
            thresholds: Thresholds::default(),
            sample_cap: 1000,
            seed: 42,
            disabled: BTreeSet::new(),
            timeout_secs: Some(30.0),
            psi_bins: 10,
            mmd_length_scale: 1.0,
            contamination: 0.1,
            isolation_trees: 100,
            classifier_trees: 50,
            cv_folds: 5,
        }
    }
}

impl DetectorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the weight of a method
    pub fn with_weight(mut self, method: &str, weight: f64) -> Self {
        self.weights.insert(method.to_string(), weight);
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the per-method time limit
    pub fn with_timeout_secs(mut self, secs: Option<f64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the kernel-method sample cap
    pub fn with_sample_cap(mut self, cap: usize) -> Self {
        self.sample_cap = cap;
        self
    }

    /// Never run the given method
    pub fn disable(mut self, kind: DetectorKind) -> Self {
        self.disabled.insert(kind);
        self
    }

    /// Voting weight for a method name
    pub fn weight_for(&self, method: &str) -> f64 {
        self.weights.get(method).copied().unwrap_or(UNKNOWN_METHOD_WEIGHT)
    }

    /// Whether a method is enabled
    pub fn is_enabled(&self, kind: DetectorKind) -> bool {
        !self.disabled.contains(&kind)
    }

    /// Check every parameter is usable
    pub fn validate(&self) -> Result<()> {
        for (method, &weight) in &self.weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(DriftError::ConfigError(format!(
                    "weight for '{}' must be a finite non-negative number, got {}",
                    method, weight
                )));
            }
        }

        let t = &self.thresholds;
        let thresholds = [
            ("ks_p_value", t.ks_p_value),
            ("psi", t.psi),
            ("psi_severe", t.psi_severe),
            ("mmd", t.mmd),
            ("isolation_forest", t.isolation_forest),
            ("covariance_drift", t.covariance_drift),
            ("classifier_auc", t.classifier_auc),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(DriftError::ConfigError(format!(
                    "threshold '{}' must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if self.sample_cap == 0 {
            return Err(DriftError::ConfigError("sample_cap must be positive".to_string()));
        }
        if self.psi_bins == 0 {
            return Err(DriftError::ConfigError("psi_bins must be positive".to_string()));
        }
        if self.cv_folds < 2 {
            return Err(DriftError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.mmd_length_scale.is_finite() && self.mmd_length_scale > 0.0) {
            return Err(DriftError::ConfigError(format!(
                "mmd_length_scale must be positive, got {}",
                self.mmd_length_scale
            )));
        }
        if !(0.0..0.5).contains(&self.contamination) {
            return Err(DriftError::ConfigError(format!(
                "contamination must be in [0, 0.5), got {}",
                self.contamination
            )));
        }
        if self.isolation_trees == 0 || self.classifier_trees == 0 {
            return Err(DriftError::ConfigError("tree counts must be positive".to_string()));
        }
        if let Some(secs) = self.timeout_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(DriftError::ConfigError(format!(
                    "timeout_secs must be non-negative, got {}",
                    secs
                )));
            }
        }

        Ok(())
    }
}

/// Settings for the detection service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Maximum number of cached reference datasets
    pub cache_capacity: usize,
    /// Configuration given to models without an explicit one
    pub default_config: DetectorConfig,
    /// Directory holding `<reference_id>.json` files
    pub reference_dir: Option<PathBuf>,
    /// JSON-lines file receiving one record per detection run
    pub tracking_path: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 32,
            default_config: DetectorConfig::default(),
            reference_dir: None,
            tracking_path: None,
        }
    }
}

impl ServiceSettings {
    /// Read overrides from the environment.
    ///
    /// `DRIFT_CACHE_CAPACITY`, `DRIFT_TIMEOUT_SECS`, `DRIFT_REFERENCE_DIR`,
    /// `DRIFT_TRACKING_PATH`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(capacity) = std::env::var("DRIFT_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            settings.cache_capacity = capacity.max(1);
        }
        if let Some(secs) = std::env::var("DRIFT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            settings.default_config.timeout_secs = Some(secs.max(0.0));
        }
        settings.reference_dir = std::env::var("DRIFT_REFERENCE_DIR").ok().map(PathBuf::from);
        settings.tracking_path = std::env::var("DRIFT_TRACKING_PATH").ok().map(PathBuf::from);

        settings
    }
}
