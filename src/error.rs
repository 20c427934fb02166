//! Error types for the drift detection engine

use thiserror::Error;

/// Result type alias for drift operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Main error type for the drift engine
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Method {method} failed: {reason}")]
    MethodError { method: String, reason: String },

    #[error("Method {method} timed out after {limit_ms} ms")]
    Timeout { method: String, limit_ms: u64 },

    #[error("Reference dataset not found: {0}")]
    ReferenceNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Sink error: {0}")]
    SinkError(String),
}

impl DriftError {
    /// Build a method error for the named detector
    pub fn method(method: &str, reason: impl Into<String>) -> Self {
        DriftError::MethodError {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        DriftError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DriftError {
    fn from(err: ndarray::ShapeError) -> Self {
        DriftError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
