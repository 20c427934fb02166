//! Kolosal Drift - ensemble drift detection for production models
//!
//! Decides whether the relationship between a *reference* dataset (the data
//! a model was trained and validated on) and a *current* dataset has shifted
//! enough to threaten the model. Six independent detectors run over the same
//! pair of datasets and a weighted vote combines them into one decision with
//! a confidence, a list of affected features and a drift type.
//!
//! # Modules
//!
//! ## Detection
//! - [`detectors`] - KS test, PSI, MMD, isolation forest, covariance envelope
//!   and classifier two-sample test runners
//! - [`drift`] - Ensemble aggregation, drift typing and [`drift::detect`]
//! - [`service`] - Reference cache, per-model config, recommendations, sinks
//!
//! ## Models and statistics
//! - [`stats`] - KS distribution, histograms, kernels, ROC AUC
//! - [`anomaly`] - Isolation Forest and elliptic envelope
//! - [`classifier`] - Decision tree, random forest, stratified k-fold
//!
//! ## Data and configuration
//! - [`dataset`] - Named numeric columns with JSON input
//! - [`config`] - Detector configuration and service settings
//!
//! ## Interfaces
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```
//! use kolosal_drift::prelude::*;
//!
//! let reference = Dataset::from_columns(vec![("x", (0..200).map(|i| i as f64).collect())])?;
//! let current = reference.map_column("x", |v| v + 500.0)?;
//!
//! let result = detect(&reference, &current, None, &DetectorConfig::default())?;
//! assert!(result.drift_detected);
//! assert!(result.features_affected.contains(&"x".to_string()));
//! # Ok::<(), kolosal_drift::DriftError>(())
//! ```

// Core error handling
pub mod error;

// Data and configuration
pub mod config;
pub mod dataset;

// Statistics and models
pub mod anomaly;
pub mod classifier;
pub mod stats;

// Detection
pub mod detectors;
pub mod drift;
pub mod service;

// Utilities
pub mod utils;

// Interfaces
pub mod cli;

pub use error::{DriftError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DriftError, Result};

    // Data and configuration
    pub use crate::config::{DetectorConfig, ServiceSettings, Thresholds};
    pub use crate::dataset::{Column, Dataset};

    // Detection
    pub use crate::detectors::{DetectorKind, MethodResult};
    pub use crate::drift::{detect, DriftResult, DriftType};

    // Service
    pub use crate::service::{
        recommend, DriftDetectionService, DriftReport, InMemoryMetricsSink, InMemoryReferenceSource,
        JsonDirReferenceSource, JsonlTrackingStore, MetricsSink, ReferenceSource, TracingMetricsSink,
        TrackingStore,
    };
}
