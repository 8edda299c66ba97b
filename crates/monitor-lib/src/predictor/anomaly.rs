//! Anomaly detection
//!
//! Flags a metric when the newest reading sits more than a configurable
//! number of standard deviations away from the readings before it.

use super::history::RollingHistory;
use super::trend::mean_std_dev;
use crate::models::{Metric, MetricAnomaly};

/// Prior samples required before a z-score is meaningful
pub const MIN_SAMPLES_FOR_DETECTION: usize = 5;

/// Default z-score threshold (3 sigma)
pub const DEFAULT_STD_DEV_THRESHOLD: f64 = 3.0;

/// Z-score detector over the rolling history
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Number of standard deviations to consider anomalous
    pub std_dev_threshold: f64,
    pub min_samples: usize,
}

impl AnomalyDetector {
    pub fn new(std_dev_threshold: f64) -> Self {
        Self {
            std_dev_threshold,
            min_samples: MIN_SAMPLES_FOR_DETECTION,
        }
    }

    /// Check `current` against a baseline of earlier values
    ///
    /// # Returns
    /// * `Some((expected, z_score))` if the deviation exceeds the threshold
    /// * `None` with too little baseline, a flat baseline, or no anomaly
    pub fn detect(&self, current: f64, baseline: &[f64]) -> Option<(f64, f64)> {
        if baseline.len() < self.min_samples {
            return None;
        }

        let (mean, std_dev) = mean_std_dev(baseline);

        // Avoid division by zero
        if std_dev < f64::EPSILON {
            return None;
        }

        let z_score = (current - mean) / std_dev;
        (z_score.abs() > self.std_dev_threshold).then_some((mean, z_score))
    }

    /// Compare the newest reading in `history` with everything before it
    pub fn scan(&self, history: &RollingHistory) -> Vec<MetricAnomaly> {
        let Some(latest) = history.latest() else {
            return Vec::new();
        };
        let earlier: Vec<_> = history.iter().take(history.len() - 1).collect();

        Metric::ALL
            .into_iter()
            .filter_map(|metric| {
                let baseline: Vec<f64> = earlier.iter().map(|r| metric.value_in(r)).collect();
                let current = metric.value_in(latest);
                self.detect(current, &baseline)
                    .map(|(expected, z_score)| MetricAnomaly {
                        metric,
                        current,
                        expected,
                        z_score,
                    })
            })
            .collect()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STD_DEV_THRESHOLD)
    }
}
