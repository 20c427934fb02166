//! Drift detection service
//!
//! Holds per-model configuration and a bounded cache of reference datasets,
//! runs the ensemble for `(model, reference, current)` requests and fans the
//! outcome out to the metrics sink and tracking store.

mod cache;
mod sinks;
mod sources;

pub use cache::{CacheStats, LruCache};
pub use sinks::{
    InMemoryMetricsSink, JsonlTrackingStore, MetricsSink, ModelGauges, TracingMetricsSink,
    TrackingRecord, TrackingStore,
};
pub use sources::{InMemoryReferenceSource, JsonDirReferenceSource, ReferenceSource};

use crate::config::{DetectorConfig, ServiceSettings};
use crate::dataset::Dataset;
use crate::drift::{detect, DriftResult, HIGH_DRIFT_SCORE};
use crate::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Most feature names quoted in a recommendation
const MAX_FOCUS_FEATURES: usize = 5;

/// Detection outcome plus the suggested action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub model_id: String,
    pub reference_id: String,
    pub result: DriftResult,
    pub recommendation: String,
}

/// Long-lived drift detection service
pub struct DriftDetectionService {
    settings: ServiceSettings,
    source: Arc<dyn ReferenceSource>,
    references: LruCache<String, Arc<Dataset>>,
    registered: RwLock<HashMap<String, Arc<Dataset>>>,
    configs: RwLock<HashMap<String, DetectorConfig>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    tracking: Option<Arc<dyn TrackingStore>>,
}

impl DriftDetectionService {
    /// Create a service reading references from `source`
    pub fn new(settings: ServiceSettings, source: Arc<dyn ReferenceSource>) -> Self {
        Self {
            references: LruCache::new(settings.cache_capacity),
            settings,
            source,
            registered: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
            metrics: None,
            tracking: None,
        }
    }

    /// Build from settings alone: references come from `reference_dir` when
    /// set (otherwise only registered ones are known), runs are tracked to
    /// `tracking_path` when set
    pub fn from_settings(settings: ServiceSettings) -> Self {
        let source: Arc<dyn ReferenceSource> = match &settings.reference_dir {
            Some(dir) => Arc::new(JsonDirReferenceSource::new(dir.clone())),
            None => Arc::new(InMemoryReferenceSource::new()),
        };
        let tracking = settings
            .tracking_path
            .clone()
            .map(|path| Arc::new(JsonlTrackingStore::new(path)) as Arc<dyn TrackingStore>);

        let mut service = Self::new(settings, source).with_metrics(Arc::new(TracingMetricsSink));
        service.tracking = tracking;
        service
    }

    /// Set the metrics sink
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Set the tracking store
    pub fn with_tracking(mut self, store: Arc<dyn TrackingStore>) -> Self {
        self.tracking = Some(store);
        self
    }

    /// Service settings
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Register a reference dataset under `reference_id`.
    ///
    /// The dataset is kept by the service and also cached; cache eviction
    /// only drops the cached copy. Registered datasets take precedence over
    /// the reference source.
    pub fn register_reference(&self, reference_id: impl Into<String>, dataset: Dataset) {
        let reference_id = reference_id.into();
        info!(reference_id = %reference_id, n_rows = dataset.n_rows(), "Registered reference dataset");
        let dataset = Arc::new(dataset);
        self.registered.write().insert(reference_id.clone(), Arc::clone(&dataset));
        if let Some(evicted) = self.references.insert(reference_id, dataset) {
            info!(reference_id = %evicted, "Evicted reference dataset");
        }
    }

    /// Drop a cached reference; the next request reloads it from the
    /// registered datasets or the source
    pub fn invalidate_reference(&self, reference_id: &str) -> bool {
        self.references.remove(&reference_id.to_string()).is_some()
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.references.stats()
    }

    /// Number of cached references
    pub fn cached_references(&self) -> usize {
        self.references.len()
    }

    /// Replace a model's configuration
    pub fn set_config(&self, model_id: impl Into<String>, config: DetectorConfig) -> Result<()> {
        config.validate()?;
        self.configs.write().insert(model_id.into(), config);
        Ok(())
    }

    /// Configuration of a model; models without one set get the default
    pub fn config_for(&self, model_id: &str) -> DetectorConfig {
        self.configs
            .read()
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| self.settings.default_config.clone())
    }

    /// Number of models with a configuration of their own
    pub fn configured_models(&self) -> usize {
        self.configs.read().len()
    }

    fn reference(&self, reference_id: &str) -> Result<Arc<Dataset>> {
        self.references
            .get_or_try_insert_with(&reference_id.to_string(), || {
                if let Some(dataset) = self.registered.read().get(reference_id) {
                    return Ok(Arc::clone(dataset));
                }
                self.source.load(reference_id).map(Arc::new)
            })
    }

    /// Check `current` against a reference for one model.
    ///
    /// Fails only when the reference cannot be resolved or the model's
    /// configuration is invalid.
    pub fn detect(
        &self,
        model_id: &str,
        reference_id: &str,
        current: &Dataset,
        target: Option<&str>,
    ) -> Result<DriftReport> {
        let reference = self.reference(reference_id)?;
        let config = self.config_for(model_id);
        let result = detect(&reference, current, target, &config)?;

        info!(
            model_id,
            reference_id,
            drift_detected = result.drift_detected,
            drift_score = result.drift_score,
            drift_type = %result.drift_type,
            status = result.status(),
            "Drift detection completed"
        );

        self.publish(model_id, &result);
        let recommendation = recommend(&result);

        Ok(DriftReport {
            model_id: model_id.to_string(),
            reference_id: reference_id.to_string(),
            result,
            recommendation,
        })
    }

    fn publish(&self, model_id: &str, result: &DriftResult) {
        if let Some(sink) = &self.metrics {
            if let Err(err) = sink.record(
                model_id,
                result.drift_score,
                result.drift_detected,
                &result.per_feature_scores,
            ) {
                warn!(model_id, error = %err, "Failed to record drift metrics");
            }
        }
        if let Some(store) = &self.tracking {
            if let Err(err) = store.log_run(model_id, result, result.status()) {
                warn!(model_id, error = %err, "Failed to log drift run");
            }
        }
    }
}

/// Suggested action for a drift result
pub fn recommend(result: &DriftResult) -> String {
    if result.all_methods_failed {
        return "Drift could not be evaluated: all detection methods failed.".to_string();
    }
    if !result.drift_detected {
        return "No action needed. Model performance is stable.".to_string();
    }

    let mut parts = Vec::new();
    if result.drift_score > HIGH_DRIFT_SCORE {
        parts.push(
            "URGENT: Significant drift detected. Consider immediate model retraining and evaluation."
                .to_string(),
        );
    }
    if result.drift_type.has_covariate() {
        parts.push(format!(
            "Retrain model with new data distribution. {} features affected.",
            result.features_affected.len()
        ));
    }
    if result.drift_type.has_concept() {
        parts.push(
            "Consider updating model architecture or features to adapt to concept drift.".to_string(),
        );
    }
    if !result.features_affected.is_empty() {
        let focus: Vec<&str> = result
            .features_affected
            .iter()
            .take(MAX_FOCUS_FEATURES)
            .map(String::as_str)
            .collect();
        parts.push(format!("Focus on features: {}", focus.join(", ")));
    }

    if parts.is_empty() {
        "Monitor closely.".to_string()
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::{aggregate, DriftType};

    fn result(detected: bool, score: f64, drift_type: DriftType, features: &[&str]) -> DriftResult {
        let mut r = aggregate(Vec::new(), &DetectorConfig::default());
        r.all_methods_failed = false;
        r.drift_detected = detected;
        r.drift_score = score;
        r.confidence = score.min(1.0);
        r.drift_type = drift_type;
        r.features_affected = features.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn test_recommend_stable() {
        let r = result(false, 0.1, DriftType::CovariateDrift, &["a"]);
        assert_eq!(recommend(&r), "No action needed. Model performance is stable.");
    }

    #[test]
    fn test_recommend_urgent_first() {
        let r = result(true, 0.9, DriftType::CovariateAndConceptDrift, &["a", "b"]);
        let text = recommend(&r);
        let parts: Vec<&str> = text.split(" | ").collect();
        assert_eq!(parts.len(), 4);
        assert!(parts[0].starts_with("URGENT"));
        assert_eq!(parts[1], "Retrain model with new data distribution. 2 features affected.");
        assert!(parts[2].contains("concept drift"));
        assert_eq!(parts[3], "Focus on features: a, b");
    }

    #[test]
    fn test_recommend_caps_focus_features() {
        let r = result(true, 0.4, DriftType::CovariateDrift, &["a", "b", "c", "d", "e", "f", "g"]);
        let text = recommend(&r);
        assert!(text.ends_with("Focus on features: a, b, c, d, e"));
        assert!(text.contains("7 features affected"));
    }

    #[test]
    fn test_recommend_monitor() {
        let r = result(true, 0.4, DriftType::NoDrift, &[]);
        assert_eq!(recommend(&r), "Monitor closely.");
    }

    #[test]
    fn test_recommend_all_failed() {
        let r = aggregate(Vec::new(), &DetectorConfig::default());
        assert!(recommend(&r).starts_with("Drift could not be evaluated"));
    }

    #[test]
    fn test_config_for_defaults_then_overrides() {
        let service = DriftDetectionService::new(
            ServiceSettings::default(),
            Arc::new(InMemoryReferenceSource::new()),
        );
        assert_eq!(service.config_for("m"), DetectorConfig::default());

        service.set_config("m", DetectorConfig::default().with_seed(7)).unwrap();
        assert_eq!(service.config_for("m").seed, 7);

        let bad = DetectorConfig::default().with_weight("psi", f64::NAN);
        assert!(service.set_config("m", bad).is_err());
    }
}
