//! Forecasting engine
//!
//! Keeps a bounded rolling history of readings, projects each metric over
//! the profile's predictive window using a least-squares trend, and decides
//! whether a predictive alert should fire.

mod anomaly;
mod history;
mod noise;
mod retrainer;
mod trend;

pub use anomaly::{AnomalyDetector, DEFAULT_STD_DEV_THRESHOLD, MIN_SAMPLES_FOR_DETECTION};
pub use history::{RollingHistory, DEFAULT_HISTORY_CAPACITY};
pub use noise::{BoundedNoise, NoNoise, NoiseSource};
pub use retrainer::{
    HistorySnapshot, MetricBaseline, Retrainer, TrainedModel, RETRAIN_INTERVAL,
};
pub use trend::{linear_regression_slope, mean_std_dev};

use crate::error::MonitorError;
use crate::models::{Forecast, MetricAnomaly, Reading};
use crate::profile::Profile;
use retrainer::seconds_between;

/// Smallest history that still leaves confidence room to grow after the
/// first observation
pub const MIN_HISTORY_CAPACITY: usize = 2;

/// Confidence floor before any history has accumulated
pub const DEFAULT_BASE_CONFIDENCE: f64 = 50.0;

/// Maximum noise, in percentage points, applied to a zero-confidence forecast
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 2.0;

/// Configuration for the predictor
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Number of readings retained in the rolling history
    pub history_capacity: usize,
    /// Confidence reported as the history approaches empty
    pub base_confidence_percent: f64,
    /// Noise amplitude in percentage points, scaled down as confidence grows
    pub noise_amplitude_percent: f64,
    /// Z-score threshold for anomaly detection
    pub anomaly_threshold: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            base_confidence_percent: DEFAULT_BASE_CONFIDENCE,
            noise_amplitude_percent: DEFAULT_NOISE_AMPLITUDE,
            anomaly_threshold: DEFAULT_STD_DEV_THRESHOLD,
        }
    }
}

/// Trend forecaster over a rolling history
pub struct Predictor {
    history: RollingHistory,
    detector: AnomalyDetector,
    noise: Box<dyn NoiseSource>,
    config: PredictorConfig,
}

impl Predictor {
    /// Create a predictor with entropy-seeded noise
    pub fn new(config: PredictorConfig) -> Self {
        Self::with_noise(config, BoundedNoise::from_entropy())
    }

    /// Create a predictor with a specific noise source
    ///
    /// Capacities below [`MIN_HISTORY_CAPACITY`] are raised to it.
    pub fn with_noise(config: PredictorConfig, noise: impl NoiseSource + 'static) -> Self {
        let capacity = config.history_capacity.max(MIN_HISTORY_CAPACITY);
        Self {
            history: RollingHistory::new(capacity),
            detector: AnomalyDetector::new(config.anomaly_threshold),
            noise: Box::new(noise),
            config,
        }
    }

    /// Append a reading, evicting the oldest one past capacity
    pub fn observe(&mut self, reading: Reading) {
        self.history.push(reading);
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    /// Confidence for the current sample count, 0-100
    ///
    /// Grows linearly from the base value and reaches 100 once the history
    /// is full.
    pub fn confidence(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let base = self.config.base_confidence_percent.clamp(0.0, 100.0);
        let fill = self.history.len().min(self.history.capacity()) as f64
            / self.history.capacity() as f64;
        (base + (100.0 - base) * fill).min(100.0)
    }

    /// Project metrics over the profile's predictive window
    ///
    /// Never mutates the history, so calling it repeatedly within a tick is
    /// safe.
    pub fn forecast(&self, profile: &Profile) -> Result<Forecast, MonitorError> {
        let latest = self.history.latest().ok_or(MonitorError::InsufficientData)?;
        let origin = self
            .history
            .iter()
            .next()
            .map(|r| r.timestamp)
            .unwrap_or(latest.timestamp);

        let horizon = profile.predictive_window();
        let horizon_secs = horizon.as_secs_f64();
        let confidence = self.confidence();
        let spread = self.config.noise_amplitude_percent * (1.0 - confidence / 100.0);

        let project = |value_of: &dyn Fn(&Reading) -> Option<f64>| -> Option<f64> {
            let points: Vec<(f64, f64)> = self
                .history
                .iter()
                .filter_map(|r| value_of(r).map(|v| (seconds_between(origin, r.timestamp), v)))
                .collect();
            let (_, last) = *points.last()?;
            Some(last + linear_regression_slope(&points) * horizon_secs)
        };

        let predicted_cpu =
            project(&|r: &Reading| Some(r.cpu_percent)).unwrap_or(latest.cpu_percent);
        let predicted_memory =
            project(&|r: &Reading| Some(r.memory_percent)).unwrap_or(latest.memory_percent);
        let predicted_traffic = project(&|r: &Reading| r.traffic_units).unwrap_or(0.0);

        let predicted_cpu = (predicted_cpu + spread * self.noise.sample()).clamp(0.0, 100.0);
        let predicted_memory =
            (predicted_memory + spread * self.noise.sample()).clamp(0.0, 100.0);
        let predicted_traffic =
            (predicted_traffic * (1.0 + spread / 100.0 * self.noise.sample())).max(0.0);

        let threshold = profile.alert_threshold_percent;
        Ok(Forecast {
            produced_at: latest.timestamp,
            horizon_secs: horizon.as_secs(),
            predicted_cpu_percent: predicted_cpu,
            predicted_memory_percent: predicted_memory,
            predicted_traffic_units: predicted_traffic,
            confidence_percent: confidence,
            alert_triggered: predicted_cpu > threshold || predicted_memory > threshold,
            samples_used: self.history.len(),
        })
    }

    /// Anomalies in the newest reading relative to the rest of the history
    pub fn detect_anomalies(&self) -> Vec<MetricAnomaly> {
        self.detector.scan(&self.history)
    }
}
