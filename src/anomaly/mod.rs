//! Anomaly detection models used by the outlier-ratio drift detectors
//!
//! Both models are fitted on the reference data and then flag rows of the
//! current data; the flagged fraction is the drift score.

mod elliptic_envelope;
mod isolation_forest;

pub use elliptic_envelope::EllipticEnvelope;
pub use isolation_forest::{IsolationForest, IsolationTree};

use crate::error::Result;
use crate::utils::Deadline;
use ndarray::{Array1, Array2};

/// Common interface of the fitted outlier models
pub trait AnomalyDetector {
    /// Fit on reference data, giving up once `deadline` expires
    fn fit_with_deadline(&mut self, x: &Array2<f64>, deadline: &Deadline) -> Result<()>;

    /// Fit without a time limit
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.fit_with_deadline(x, &Deadline::none())
    }

    /// Outlier score per row, higher means more anomalous
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Score above which a row is an outlier
    fn threshold(&self) -> f64;

    /// Whether a score marks an outlier
    fn is_outlier(&self, score: f64) -> bool {
        score > self.threshold()
    }

    /// Labels per row: -1 for outliers, 1 for inliers
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let scores = self.score_samples(x)?;
        Ok(scores.mapv(|s| if self.is_outlier(s) { -1 } else { 1 }))
    }

    /// Fraction of rows flagged as outliers
    fn outlier_fraction(&self, x: &Array2<f64>) -> Result<f64> {
        if x.nrows() == 0 {
            return Ok(0.0);
        }
        let labels = self.predict(x)?;
        let n_outliers = labels.iter().filter(|&&l| l == -1).count();
        Ok(n_outliers as f64 / x.nrows() as f64)
    }
}
