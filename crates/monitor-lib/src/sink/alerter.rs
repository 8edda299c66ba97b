//! Alert formatting for webhook delivery
//!
//! Handles:
//! - Mapping actionable monitor events to Alertmanager-style alerts
//! - Deduplication of alerts within a configurable window

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::models::{AnomalyReport, Forecast, HealthVerdict, Metric, MonitorEvent};

/// Default deduplication window (15 minutes)
const DEFAULT_DEDUP_WINDOW_SECS: u64 = 15 * 60;

/// A metric at or above this percentage makes a degraded verdict critical
pub const CRITICAL_PERCENT: f64 = 95.0;

/// Anomalies this many standard deviations out are critical
pub const CRITICAL_Z_SCORE: f64 = 6.0;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Alert type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HealthDegraded,
    PredictedExhaustion,
    MetricAnomaly,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::HealthDegraded => write!(f, "SystemHealthDegraded"),
            AlertType::PredictedExhaustion => write!(f, "PredictedResourceExhaustion"),
            AlertType::MetricAnomaly => write!(f, "MetricAnomaly"),
        }
    }
}

/// Alertmanager webhook alert format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerAlert {
    /// Alert status (firing or resolved)
    pub status: String,
    /// Alert labels for routing and grouping
    pub labels: HashMap<String, String>,
    /// Alert annotations with details
    pub annotations: HashMap<String, String>,
    /// Start time in RFC3339 format
    pub starts_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

/// Alertmanager webhook payload (array of alerts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertmanagerPayload {
    pub alerts: Vec<AlertmanagerAlert>,
}

/// Where the alert comes from
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub environment: String,
    pub instance: String,
    pub generator_url: Option<String>,
}

/// Key for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    alert_type: AlertType,
    subject: String,
}

/// Alert builder with deduplication
pub struct Alerter {
    /// Deduplication window
    dedup_window: Duration,
    /// Recent alerts for deduplication (key -> last emission time)
    recent_alerts: RwLock<HashMap<DedupKey, Instant>>,
    context: AlertContext,
}

impl Alerter {
    /// Create a new alerter with default 15-minute deduplication window
    pub fn new(context: AlertContext) -> Self {
        Self {
            dedup_window: Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS),
            recent_alerts: RwLock::new(HashMap::new()),
            context,
        }
    }

    /// Set custom deduplication window
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Build an alert for an actionable event
    ///
    /// Returns `None` for non-actionable events and for alerts already sent
    /// within the deduplication window.
    pub fn alert_for(&self, event: &MonitorEvent) -> Option<AlertmanagerAlert> {
        if !event.is_actionable() {
            return None;
        }

        let (alert_type, subject) = match event {
            MonitorEvent::Verdict(v) => {
                (AlertType::HealthDegraded, v.degraded_components().join(","))
            }
            MonitorEvent::Forecast(_) => (AlertType::PredictedExhaustion, String::new()),
            MonitorEvent::Anomaly(a) => (
                AlertType::MetricAnomaly,
                a.anomalies
                    .iter()
                    .map(|m| m.metric.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        };
        let key = DedupKey {
            alert_type,
            subject,
        };

        if self.should_suppress(&key) {
            return None;
        }

        let alert = match event {
            MonitorEvent::Verdict(v) => self.verdict_alert(v),
            MonitorEvent::Forecast(f) => self.forecast_alert(f),
            MonitorEvent::Anomaly(a) => self.anomaly_alert(a),
        };
        self.record_alert(key);
        Some(alert)
    }

    fn should_suppress(&self, key: &DedupKey) -> bool {
        let alerts = self
            .recent_alerts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        alerts
            .get(key)
            .map(|last| last.elapsed() < self.dedup_window)
            .unwrap_or(false)
    }

    fn record_alert(&self, key: DedupKey) {
        let mut alerts = self
            .recent_alerts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        alerts.insert(key, Instant::now());

        // Clean up old entries
        alerts.retain(|_, time| time.elapsed() < self.dedup_window);
    }

    fn base_alert(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        starts_at: String,
        summary: String,
        description: String,
    ) -> AlertmanagerAlert {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), alert_type.to_string());
        labels.insert("severity".to_string(), severity.to_string());
        labels.insert("environment".to_string(), self.context.environment.clone());
        labels.insert("instance".to_string(), self.context.instance.clone());

        let mut annotations = HashMap::new();
        annotations.insert("summary".to_string(), summary);
        annotations.insert("description".to_string(), description);

        AlertmanagerAlert {
            status: "firing".to_string(),
            labels,
            annotations,
            starts_at,
            ends_at: None,
            generator_url: self.context.generator_url.clone(),
        }
    }

    fn verdict_alert(&self, verdict: &HealthVerdict) -> AlertmanagerAlert {
        let critical = Metric::ALL
            .iter()
            .any(|m| verdict.check(*m).value_percent >= CRITICAL_PERCENT);
        let severity = if critical {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        let mut alert = self.base_alert(
            AlertType::HealthDegraded,
            severity,
            verdict.timestamp.to_rfc3339(),
            format!("System health degraded on {}", self.context.instance),
            format!(
                "Degraded: {}. CPU {:.1}%, memory {:.1}%, disk {:.1}% (threshold {:.0}%).",
                verdict.degraded_components().join(", "),
                verdict.cpu.value_percent,
                verdict.memory.value_percent,
                verdict.disk.value_percent,
                verdict.cpu.threshold_percent
            ),
        );
        alert.annotations.insert(
            "degraded_components".to_string(),
            verdict.degraded_components().join(","),
        );
        alert
    }

    fn forecast_alert(&self, forecast: &Forecast) -> AlertmanagerAlert {
        let mut alert = self.base_alert(
            AlertType::PredictedExhaustion,
            AlertSeverity::Warning,
            forecast.produced_at.to_rfc3339(),
            format!(
                "Resource threshold expected to be exceeded within {}s",
                forecast.horizon_secs
            ),
            format!(
                "Predicted CPU {:.1}%, memory {:.1}% (confidence {:.0}%).",
                forecast.predicted_cpu_percent,
                forecast.predicted_memory_percent,
                forecast.confidence_percent
            ),
        );
        alert.annotations.insert(
            "confidence_percent".to_string(),
            format!("{:.2}", forecast.confidence_percent),
        );
        alert
    }

    fn anomaly_alert(&self, report: &AnomalyReport) -> AlertmanagerAlert {
        let critical = report
            .anomalies
            .iter()
            .any(|a| a.z_score.abs() >= CRITICAL_Z_SCORE);
        let severity = if critical {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        let details: Vec<String> = report
            .anomalies
            .iter()
            .map(|a| {
                format!(
                    "{} at {:.1}% (expected {:.1}%, z-score {:.1})",
                    a.metric, a.current, a.expected, a.z_score
                )
            })
            .collect();

        self.base_alert(
            AlertType::MetricAnomaly,
            severity,
            report.detected_at.to_rfc3339(),
            format!("Metric anomaly on {}", self.context.instance),
            details.join("; "),
        )
    }

    /// Create an Alertmanager payload from multiple alerts
    pub fn create_alertmanager_payload(alerts: Vec<AlertmanagerAlert>) -> AlertmanagerPayload {
        AlertmanagerPayload { alerts }
    }
}
