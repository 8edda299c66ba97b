//! Core data models for the health monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cloud provider identifier, normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health classification shared by metrics, providers and verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Percent-valued metrics the evaluator and predictor track
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Memory, Metric::Disk];

    /// Value of this metric in a reading
    pub fn value_in(&self, reading: &Reading) -> f64 {
        match self {
            Metric::Cpu => reading.cpu_percent,
            Metric::Memory => reading.memory_percent,
            Metric::Disk => reading.disk_percent,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cpu => write!(f, "cpu"),
            Metric::Memory => write!(f, "memory"),
            Metric::Disk => write!(f, "disk"),
        }
    }
}

/// One sampled snapshot of system metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    /// Request traffic in arbitrary units, when the source measures it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_units: Option<f64>,
    #[serde(default)]
    pub provider_status: BTreeMap<ProviderId, HealthStatus>,
}

impl Reading {
    /// Reading with the given percentages and no provider data
    pub fn new(timestamp: DateTime<Utc>, cpu: f64, memory: f64, disk: f64) -> Self {
        Self {
            timestamp,
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            traffic_units: None,
            provider_status: BTreeMap::new(),
        }
    }

    pub fn with_traffic(mut self, units: f64) -> Self {
        self.traffic_units = Some(units);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<ProviderId>, status: HealthStatus) -> Self {
        self.provider_status.insert(provider.into(), status);
        self
    }
}

/// Result of comparing one metric against the alert threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricCheck {
    pub value_percent: f64,
    pub threshold_percent: f64,
    pub status: HealthStatus,
}

/// Health classification derived from a single reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub timestamp: DateTime<Utc>,
    pub overall: HealthStatus,
    pub cpu: MetricCheck,
    pub memory: MetricCheck,
    pub disk: MetricCheck,
    pub providers: BTreeMap<ProviderId, HealthStatus>,
}

impl HealthVerdict {
    pub fn check(&self, metric: Metric) -> &MetricCheck {
        match metric {
            Metric::Cpu => &self.cpu,
            Metric::Memory => &self.memory,
            Metric::Disk => &self.disk,
        }
    }

    /// Names of every degraded metric and provider
    pub fn degraded_components(&self) -> Vec<String> {
        let metrics = Metric::ALL
            .iter()
            .filter(|m| self.check(**m).status.is_degraded())
            .map(|m| m.to_string());
        let providers = self
            .providers
            .iter()
            .filter(|(_, status)| status.is_degraded())
            .map(|(id, _)| id.to_string());
        metrics.chain(providers).collect()
    }
}

/// Predicted metric values over the profile's predictive window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub produced_at: DateTime<Utc>,
    pub horizon_secs: u64,
    pub predicted_cpu_percent: f64,
    pub predicted_memory_percent: f64,
    pub predicted_traffic_units: f64,
    /// Confidence score between 0 and 100
    pub confidence_percent: f64,
    pub alert_triggered: bool,
    pub samples_used: usize,
}

/// A metric whose newest value sits far outside its recent history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnomaly {
    pub metric: Metric,
    pub current: f64,
    pub expected: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub detected_at: DateTime<Utc>,
    pub anomalies: Vec<MetricAnomaly>,
}

/// Event handed to alert sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MonitorEvent {
    Verdict(HealthVerdict),
    Forecast(Forecast),
    Anomaly(AnomalyReport),
}

impl MonitorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::Verdict(_) => "verdict",
            MonitorEvent::Forecast(_) => "forecast",
            MonitorEvent::Anomaly(_) => "anomaly",
        }
    }

    /// Whether this event represents something an operator should act on
    pub fn is_actionable(&self) -> bool {
        match self {
            MonitorEvent::Verdict(v) => v.overall.is_degraded(),
            MonitorEvent::Forecast(f) => f.alert_triggered,
            MonitorEvent::Anomaly(a) => !a.anomalies.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_normalized() {
        assert_eq!(ProviderId::new(" AWS "), ProviderId::new("aws"));
        assert_eq!(ProviderId::from("GCP").as_str(), "gcp");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let report = AnomalyReport {
            detected_at: Utc::now(),
            anomalies: vec![],
        };
        let json = serde_json::to_value(MonitorEvent::Anomaly(report)).unwrap();
        assert_eq!(json["event"], "anomaly");
        assert!(json["data"]["anomalies"].is_array());
    }

    #[test]
    fn test_reading_deserializes_without_optional_fields() {
        let json = r#"{
            "timestamp": "2024-01-01T00:00:00Z",
            "cpu_percent": 10.0,
            "memory_percent": 20.0,
            "disk_percent": 30.0
        }"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert!(reading.traffic_units.is_none());
        assert!(reading.provider_status.is_empty());
    }
}
