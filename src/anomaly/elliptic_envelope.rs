//! Robust covariance (elliptic envelope) outlier detection
//!
//! The location and shape are estimated with a minimum covariance
//! determinant search: several seeded random subsets of size
//! `h = ceil((n + p + 1) / 2)` are refined with concentration steps (refit on
//! the `h` rows closest in Mahalanobis distance) and the subset with the
//! smallest covariance determinant wins. Outliers are rows whose squared
//! Mahalanobis distance exceeds the training quantile implied by the
//! contamination ratio.

use crate::anomaly::AnomalyDetector;
use crate::error::{DriftError, Result};
use crate::utils::{cmp_f64, Deadline};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Relative pivot size below which a covariance matrix counts as singular
const SINGULAR_TOL: f64 = 1e-10;

/// Elliptic envelope outlier detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EllipticEnvelope {
    /// Expected proportion of outliers in the training data
    contamination: f64,
    /// Random seed for the subset search
    seed: u64,
    /// Number of random starts
    n_starts: usize,
    /// Maximum concentration steps per start
    max_steps: usize,
    /// Robust location
    location: Option<Array1<f64>>,
    /// Cholesky factor of the robust covariance
    cholesky: Option<Array2<f64>>,
    /// Squared-distance threshold
    threshold: Option<f64>,
}

impl EllipticEnvelope {
    /// Create a new envelope
    pub fn new() -> Self {
        Self {
            contamination: 0.1,
            seed: 42,
            n_starts: 10,
            max_steps: 30,
            location: None,
            cholesky: None,
            threshold: None,
        }
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c.clamp(0.0, 0.5);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set number of random starts
    pub fn with_n_starts(mut self, n: usize) -> Self {
        self.n_starts = n.max(1);
        self
    }

    /// Robust location estimate
    pub fn location(&self) -> Option<&Array1<f64>> {
        self.location.as_ref()
    }

    /// Squared Mahalanobis distance of each row
    pub fn mahalanobis(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let location = self.location.as_ref().ok_or(DriftError::ModelNotFitted)?;
        let chol = self.cholesky.as_ref().ok_or(DriftError::ModelNotFitted)?;
        if x.ncols() != location.len() {
            return Err(DriftError::ShapeError {
                expected: format!("{} features", location.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(squared_distances(x, location, chol))
    }
}

impl Default for EllipticEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for EllipticEnvelope {
    fn fit_with_deadline(&mut self, x: &Array2<f64>, deadline: &Deadline) -> Result<()> {
        let (n, p) = x.dim();
        if p == 0 {
            return Err(DriftError::ValidationError(
                "elliptic envelope needs at least one feature".to_string(),
            ));
        }
        if n < p + 2 {
            return Err(DriftError::ValidationError(format!(
                "elliptic envelope needs at least {} rows for {} features, got {}",
                p + 2,
                p,
                n
            )));
        }

        let h = ((n + p + 1) as f64 / 2.0).ceil() as usize;
        let h = h.min(n);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut best: Option<(f64, Array1<f64>, Array2<f64>)> = None;

        for _ in 0..self.n_starts {
            deadline.check("covariance_drift")?;

            let mut subset = rand::seq::index::sample(&mut rng, n, h).into_vec();
            subset.sort_unstable();

            let Some(mut fit) = fit_subset(x, &subset) else {
                continue;
            };

            for _ in 0..self.max_steps {
                deadline.check("covariance_drift")?;

                let distances = squared_distances(x, &fit.1, &fit.2);
                let mut next = closest_rows(&distances, h);
                next.sort_unstable();
                if next == subset {
                    break;
                }
                match fit_subset(x, &next) {
                    Some(refit) => {
                        subset = next;
                        fit = refit;
                    }
                    None => break,
                }
            }

            let improves = best.as_ref().map_or(true, |(log_det, _, _)| fit.0 < *log_det);
            if improves {
                best = Some(fit);
            }
        }

        let (_, location, chol) = best.ok_or_else(|| {
            DriftError::ComputationError("covariance matrix is singular".to_string())
        })?;

        let mut distances = squared_distances(x, &location, &chol).to_vec();
        distances.sort_by(|a, b| cmp_f64(b, a));
        let threshold_idx = ((self.contamination * n as f64) as usize).min(n - 1);

        self.threshold = Some(distances[threshold_idx]);
        self.location = Some(location);
        self.cholesky = Some(chol);

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.mahalanobis(x)
    }

    fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(f64::INFINITY)
    }
}

/// Mean, covariance Cholesky factor and log-determinant of a row subset
fn fit_subset(x: &Array2<f64>, rows: &[usize]) -> Option<(f64, Array1<f64>, Array2<f64>)> {
    let sub = x.select(Axis(0), rows);
    let m = sub.nrows() as f64;
    let mean = sub.mean_axis(Axis(0))?;
    let centered = &sub - &mean;
    let cov = centered.t().dot(&centered) / (m - 1.0).max(1.0);

    let chol = cholesky(&cov)?;
    let log_det = 2.0 * chol.diag().iter().map(|d| d.ln()).sum::<f64>();
    Some((log_det, mean, chol))
}

/// Indices of the `h` smallest distances
fn closest_rows(distances: &Array1<f64>, h: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| cmp_f64(&distances[a], &distances[b]));
    order.truncate(h);
    order
}

/// Lower Cholesky factor, `None` when the matrix is not positive definite
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let pivot = a[[i, i]] - sum;
                if !(pivot > 0.0 && pivot > SINGULAR_TOL * a[[i, i]].abs()) {
                    return None;
                }
                l[[i, i]] = pivot.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Squared Mahalanobis distances using the Cholesky factor of the covariance
fn squared_distances(x: &Array2<f64>, location: &Array1<f64>, chol: &Array2<f64>) -> Array1<f64> {
    let p = location.len();
    let mut out = Array1::zeros(x.nrows());
    let mut y = vec![0.0; p];

    for (r, row) in x.rows().into_iter().enumerate() {
        // Solve L y = (x - mu); the distance is |y|^2
        for i in 0..p {
            let mut v = row[i] - location[i];
            for j in 0..i {
                v -= chol[[i, j]] * y[j];
            }
            y[i] = v / chol[[i, i]];
        }
        out[r] = y.iter().map(|v| v * v).sum();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_data(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64 / n as f64;
            if j == 0 {
                (t * 37.0).sin() * 2.0
            } else {
                (t * 53.0).cos() + t
            }
        })
    }

    #[test]
    fn test_cholesky_identity() {
        let a = Array2::<f64>::eye(3) * 4.0;
        let l = cholesky(&a).unwrap();
        assert!((l[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((l[[2, 2]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_singular() {
        let a = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        assert!(cholesky(&a).is_none());
    }

    #[test]
    fn test_envelope_flags_far_points() {
        let x = grid_data(200);
        let mut envelope = EllipticEnvelope::new().with_contamination(0.1);
        envelope.fit(&x).unwrap();

        let far = Array2::from_shape_vec((2, 2), vec![50.0, 50.0, -40.0, 30.0]).unwrap();
        assert_eq!(envelope.outlier_fraction(&far).unwrap(), 1.0);
        assert!(envelope.outlier_fraction(&x).unwrap() <= 0.1 + 1e-12);
    }

    #[test]
    fn test_constant_column_is_singular() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| if j == 0 { i as f64 } else { 3.0 });
        let mut envelope = EllipticEnvelope::new();
        let err = envelope.fit(&x).unwrap_err();
        assert!(matches!(err, DriftError::ComputationError(_)));
    }

    #[test]
    fn test_too_few_rows() {
        let x = Array2::from_shape_fn((3, 2), |(i, j)| (i + j) as f64);
        let mut envelope = EllipticEnvelope::new();
        assert!(matches!(envelope.fit(&x), Err(DriftError::ValidationError(_))));
    }
}
