//! Observability infrastructure for the health monitor
//!
//! Provides:
//! - Prometheus metrics (tick latency, skipped ticks, forecasts, alerts, sink failures)
//! - Structured JSON logging with tracing

use crate::models::{AnomalyReport, Forecast, HealthVerdict};
use crate::predictor::TrainedModel;
use crate::profile::Profile;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Default histogram buckets for tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct MonitorMetricsInner {
    tick_latency_seconds: Histogram,
    ticks_completed: IntCounter,
    ticks_skipped: IntCounterVec,
    verdict_degraded: IntGauge,
    forecasts_generated: IntCounter,
    predictive_alerts: IntCounter,
    forecast_confidence: Gauge,
    anomalies_detected: IntCounter,
    history_samples: IntGauge,
    sink_timeouts: IntCounter,
    sink_errors: IntCounter,
    retrain_runs: IntCounter,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "health_monitor_tick_latency_seconds",
                "Time spent running one evaluation tick",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks_completed: register_int_counter!(
                "health_monitor_ticks_total",
                "Total number of evaluation ticks that produced a verdict"
            )
            .expect("Failed to register ticks_total"),

            ticks_skipped: register_int_counter_vec!(
                "health_monitor_ticks_skipped_total",
                "Evaluation ticks skipped, by reason",
                &["reason"]
            )
            .expect("Failed to register ticks_skipped_total"),

            verdict_degraded: register_int_gauge!(
                "health_monitor_verdict_degraded",
                "1 when the latest verdict was degraded, 0 otherwise"
            )
            .expect("Failed to register verdict_degraded"),

            forecasts_generated: register_int_counter!(
                "health_monitor_forecasts_total",
                "Total number of forecasts produced"
            )
            .expect("Failed to register forecasts_total"),

            predictive_alerts: register_int_counter!(
                "health_monitor_predictive_alerts_total",
                "Total number of forecasts that triggered a predictive alert"
            )
            .expect("Failed to register predictive_alerts_total"),

            forecast_confidence: register_gauge!(
                "health_monitor_forecast_confidence_percent",
                "Confidence of the latest forecast"
            )
            .expect("Failed to register forecast_confidence_percent"),

            anomalies_detected: register_int_counter!(
                "health_monitor_anomalies_total",
                "Total number of metric anomalies detected"
            )
            .expect("Failed to register anomalies_total"),

            history_samples: register_int_gauge!(
                "health_monitor_history_samples",
                "Readings currently held in the rolling history"
            )
            .expect("Failed to register history_samples"),

            sink_timeouts: register_int_counter!(
                "health_monitor_sink_timeouts_total",
                "Events dropped because an alert sink timed out"
            )
            .expect("Failed to register sink_timeouts_total"),

            sink_errors: register_int_counter!(
                "health_monitor_sink_errors_total",
                "Events an alert sink failed to accept"
            )
            .expect("Failed to register sink_errors_total"),

            retrain_runs: register_int_counter!(
                "health_monitor_retrain_runs_total",
                "Completed model retraining passes"
            )
            .expect("Failed to register retrain_runs_total"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn inc_ticks_completed(&self) {
        self.inner().ticks_completed.inc();
    }

    pub fn inc_ticks_skipped(&self, reason: &str) {
        self.inner().ticks_skipped.with_label_values(&[reason]).inc();
    }

    pub fn set_verdict_degraded(&self, degraded: bool) {
        self.inner().verdict_degraded.set(i64::from(degraded));
    }

    pub fn record_forecast(&self, forecast: &Forecast) {
        let inner = self.inner();
        inner.forecasts_generated.inc();
        inner.forecast_confidence.set(forecast.confidence_percent);
        if forecast.alert_triggered {
            inner.predictive_alerts.inc();
        }
    }

    pub fn inc_anomalies(&self, count: usize) {
        self.inner().anomalies_detected.inc_by(count as u64);
    }

    pub fn set_history_samples(&self, count: usize) {
        self.inner().history_samples.set(count as i64);
    }

    pub fn inc_sink_timeouts(&self) {
        self.inner().sink_timeouts.inc();
    }

    pub fn inc_sink_errors(&self) {
        self.inner().sink_errors.inc();
    }

    pub fn inc_retrain_runs(&self) {
        self.inner().retrain_runs.inc();
    }
}

/// Structured logger for monitor events
///
/// Provides consistent JSON-formatted logging for verdicts, forecasts,
/// anomalies, and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    environment: String,
    detailed: bool,
}

impl StructuredLogger {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            detailed: false,
        }
    }

    /// Logger configured from a profile; debug profiles log full verdicts
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            environment: profile.environment.to_string(),
            detailed: profile.debug_mode,
        }
    }

    pub fn log_startup(&self, version: &str, profile: &Profile) {
        info!(
            event = "monitor_started",
            environment = %self.environment,
            monitor_version = %version,
            profile_version = ?profile.version,
            interval_ms = profile.interval_ms,
            alert_threshold_percent = profile.alert_threshold_percent,
            debug_mode = profile.debug_mode,
            ai_enabled = profile.ai_enabled(),
            "Health monitor started"
        );
        if let Some(ai) = &profile.ai {
            let providers: Vec<&str> = ai.cloud_providers.iter().map(|p| p.as_str()).collect();
            info!(
                event = "ai_prediction_enabled",
                environment = %self.environment,
                predictive_window_secs = ai.predictive_window_secs,
                cloud_providers = %providers.join(","),
                "AI prediction enabled"
            );
        }
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            environment = %self.environment,
            reason = %reason,
            "Health monitor shutting down"
        );
    }

    pub fn log_verdict(&self, verdict: &HealthVerdict) {
        if verdict.overall.is_degraded() {
            warn!(
                event = "health_verdict",
                environment = %self.environment,
                overall = %verdict.overall,
                degraded = %verdict.degraded_components().join(","),
                cpu_percent = verdict.cpu.value_percent,
                memory_percent = verdict.memory.value_percent,
                disk_percent = verdict.disk.value_percent,
                "System status: DEGRADED"
            );
        } else if self.detailed {
            info!(
                event = "health_verdict",
                environment = %self.environment,
                overall = %verdict.overall,
                cpu_percent = verdict.cpu.value_percent,
                memory_percent = verdict.memory.value_percent,
                disk_percent = verdict.disk.value_percent,
                providers = verdict.providers.len(),
                "System status: HEALTHY"
            );
        } else {
            info!(
                event = "health_verdict",
                environment = %self.environment,
                overall = %verdict.overall,
                "System status: HEALTHY"
            );
        }
    }

    pub fn log_forecast(&self, forecast: &Forecast) {
        if forecast.alert_triggered {
            warn!(
                event = "predictive_alert",
                environment = %self.environment,
                horizon_secs = forecast.horizon_secs,
                predicted_cpu_percent = forecast.predicted_cpu_percent,
                predicted_memory_percent = forecast.predicted_memory_percent,
                confidence_percent = forecast.confidence_percent,
                "Predictive alert: threshold expected to be exceeded"
            );
        } else {
            info!(
                event = "forecast_generated",
                environment = %self.environment,
                horizon_secs = forecast.horizon_secs,
                predicted_cpu_percent = forecast.predicted_cpu_percent,
                predicted_memory_percent = forecast.predicted_memory_percent,
                predicted_traffic_units = forecast.predicted_traffic_units,
                confidence_percent = forecast.confidence_percent,
                samples = forecast.samples_used,
                "Generated forecast"
            );
        }
    }

    pub fn log_anomalies(&self, report: &AnomalyReport) {
        for anomaly in &report.anomalies {
            warn!(
                event = "anomaly_detected",
                environment = %self.environment,
                metric = %anomaly.metric,
                current = anomaly.current,
                expected = anomaly.expected,
                z_score = anomaly.z_score,
                "Anomaly detected"
            );
        }
    }

    pub fn log_tick_skipped(&self, reason: &str, details: &str) {
        warn!(
            event = "tick_skipped",
            environment = %self.environment,
            reason = %reason,
            details = %details,
            "Evaluation tick skipped"
        );
    }

    pub fn log_forecast_skipped(&self, details: &str) {
        debug!(
            event = "forecast_skipped",
            environment = %self.environment,
            details = %details,
            "Forecast skipped"
        );
    }

    pub fn log_model_retrained(&self, model: &TrainedModel) {
        info!(
            event = "model_retrained",
            environment = %self.environment,
            model_version = model.version,
            samples = model.samples,
            "Model updated successfully"
        );
    }

    pub fn log_model_artifact(&self, path: &str, checksum: Option<&str>, size_bytes: Option<u64>) {
        match checksum {
            Some(checksum) => info!(
                event = "model_artifact",
                environment = %self.environment,
                path = %path,
                sha256 = %checksum,
                size_bytes = ?size_bytes,
                "Model artifact loaded"
            ),
            None => warn!(
                event = "model_artifact",
                environment = %self.environment,
                path = %path,
                "Model artifact not found, continuing with trend forecasting"
            ),
        }
    }
}
