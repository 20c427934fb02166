//! Metrics and run-tracking collaborators
//!
//! Both are best effort from the service's point of view: a failing sink is
//! logged and never changes a detection result.

use crate::drift::DriftResult;
use crate::error::{DriftError, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Receives drift gauges per model
pub trait MetricsSink: Send + Sync {
    fn record(
        &self,
        model_id: &str,
        drift_score: f64,
        drift_detected: bool,
        per_feature_scores: &BTreeMap<String, f64>,
    ) -> Result<()>;
}

/// Persists one record per detection run
pub trait TrackingStore: Send + Sync {
    fn log_run(&self, model_id: &str, result: &DriftResult, status: &str) -> Result<()>;
}

/// Emits gauges as structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record(
        &self,
        model_id: &str,
        drift_score: f64,
        drift_detected: bool,
        per_feature_scores: &BTreeMap<String, f64>,
    ) -> Result<()> {
        info!(
            target: "kolosal_drift::metrics",
            model_id,
            drift_score,
            drift_detected,
            "model_drift_score"
        );
        for (feature, score) in per_feature_scores {
            info!(
                target: "kolosal_drift::metrics",
                model_id,
                feature = %feature,
                score,
                "feature_drift_score"
            );
        }
        Ok(())
    }
}

/// Latest gauges of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGauges {
    pub drift_score: f64,
    pub drift_detected: bool,
    pub feature_scores: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

/// Keeps the latest gauges per model in memory
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    gauges: RwLock<HashMap<String, ModelGauges>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest gauges recorded for a model
    pub fn gauges(&self, model_id: &str) -> Option<ModelGauges> {
        self.gauges.read().get(model_id).cloned()
    }

    /// Number of models with gauges
    pub fn len(&self) -> usize {
        self.gauges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(
        &self,
        model_id: &str,
        drift_score: f64,
        drift_detected: bool,
        per_feature_scores: &BTreeMap<String, f64>,
    ) -> Result<()> {
        self.gauges.write().insert(
            model_id.to_string(),
            ModelGauges {
                drift_score,
                drift_detected,
                feature_scores: per_feature_scores.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

/// One line of the tracking log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub status: String,
    pub drift_detected: bool,
    pub drift_score: f64,
    pub drift_type: String,
    pub confidence: f64,
    pub features_affected: Vec<String>,
    pub method_scores: BTreeMap<String, f64>,
    pub failed_methods: Vec<String>,
}

impl TrackingRecord {
    pub fn new(model_id: &str, result: &DriftResult, status: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model_id: model_id.to_string(),
            status: status.to_string(),
            drift_detected: result.drift_detected,
            drift_score: result.drift_score,
            drift_type: result.drift_type.to_string(),
            confidence: result.confidence,
            features_affected: result.features_affected.clone(),
            method_scores: result
                .per_method
                .iter()
                .filter(|r| r.is_ok())
                .map(|r| (r.method.clone(), r.drift_score))
                .collect(),
            failed_methods: result
                .failed_methods()
                .into_iter()
                .map(|r| r.method.clone())
                .collect(),
        }
    }
}

/// Appends one JSON object per run to a file
#[derive(Debug)]
pub struct JsonlTrackingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTrackingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read every record back
    pub fn read_all(&self) -> Result<Vec<TrackingRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(DriftError::from))
            .collect()
    }
}

impl TrackingStore for JsonlTrackingStore {
    fn log_run(&self, model_id: &str, result: &DriftResult, status: &str) -> Result<()> {
        let record = TrackingRecord::new(model_id, result, status);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
