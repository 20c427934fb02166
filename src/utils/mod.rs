//! Utility functions and types

use crate::error::{DriftError, Result};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Cooperative time limit for CPU-bound fitting.
///
/// Long-running routines call [`Deadline::check`] between units of work
/// (trees, concentration steps, folds) so an expired limit stops the work
/// on the calling thread instead of leaving a worker running.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires
    pub fn none() -> Self {
        Self {
            start: Instant::now(),
            limit: None,
        }
    }

    /// A deadline expiring `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit: Some(limit),
        }
    }

    /// Build from an optional number of seconds
    pub fn from_secs(secs: Option<f64>) -> Self {
        match secs {
            Some(s) if s.is_finite() && s >= 0.0 => Self::after(Duration::from_secs_f64(s)),
            _ => Self::none(),
        }
    }

    /// Whether the limit has passed
    pub fn is_expired(&self) -> bool {
        self.limit.map_or(false, |limit| self.start.elapsed() >= limit)
    }

    /// Time elapsed since the deadline was armed
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Fail with [`DriftError::Timeout`] once expired
    pub fn check(&self, method: &str) -> Result<()> {
        if self.is_expired() {
            let limit_ms = self.limit.map(|l| l.as_millis() as u64).unwrap_or(0);
            return Err(DriftError::Timeout {
                method: method.to_string(),
                limit_ms,
            });
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

/// Total order for floats that treats NaN as equal
pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Sort a float slice ascending
pub fn sort_f64(values: &mut [f64]) {
    values.sort_by(cmp_f64);
}
