//! Where reference datasets come from

use crate::dataset::Dataset;
use crate::error::{DriftError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Loads reference datasets by id
pub trait ReferenceSource: Send + Sync {
    /// Load a reference; unknown ids are [`DriftError::ReferenceNotFound`]
    fn load(&self, reference_id: &str) -> Result<Dataset>;
}

/// References held in memory
#[derive(Debug, Default)]
pub struct InMemoryReferenceSource {
    datasets: RwLock<HashMap<String, Dataset>>,
}

impl InMemoryReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a reference
    pub fn insert(&self, reference_id: impl Into<String>, dataset: Dataset) {
        self.datasets.write().insert(reference_id.into(), dataset);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_dataset(self, reference_id: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(reference_id, dataset);
        self
    }
}

impl ReferenceSource for InMemoryReferenceSource {
    fn load(&self, reference_id: &str) -> Result<Dataset> {
        self.datasets
            .read()
            .get(reference_id)
            .cloned()
            .ok_or_else(|| DriftError::ReferenceNotFound(reference_id.to_string()))
    }
}

/// References stored as `<dir>/<reference_id>.json`, in either the records
/// or the column form
#[derive(Debug, Clone)]
pub struct JsonDirReferenceSource {
    dir: PathBuf,
}

impl JsonDirReferenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, reference_id: &str) -> Result<PathBuf> {
        let valid = !reference_id.is_empty()
            && reference_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !reference_id.starts_with('.');
        if !valid {
            return Err(DriftError::ValidationError(format!(
                "invalid reference id '{}'",
                reference_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", reference_id)))
    }
}

impl ReferenceSource for JsonDirReferenceSource {
    fn load(&self, reference_id: &str) -> Result<Dataset> {
        let path = self.path_for(reference_id)?;
        if !path.is_file() {
            return Err(DriftError::ReferenceNotFound(reference_id.to_string()));
        }
        debug!(reference_id, path = %path.display(), "Loading reference dataset");
        Dataset::from_json_file(&path)
    }
}
