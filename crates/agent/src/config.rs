//! Monitor configuration
//!
//! Read once at startup from `MONITOR_*` environment variables. The
//! environment discriminator picks the profile preset; the optional interval
//! and threshold overrides are applied on top of it.

use anyhow::{bail, Context, Result};
use monitor_lib::predictor::{DEFAULT_HISTORY_CAPACITY, MIN_HISTORY_CAPACITY};
use monitor_lib::ProfileOverrides;
use serde::Deserialize;
use std::time::Duration;

/// Where readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Host CPU, memory and disk via sysinfo
    System,
    /// Synthetic readings
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Environment discriminator: production, development or simulator
    #[serde(default)]
    pub environment: Option<String>,

    /// Name reported in alerts
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Defaults to `simulated` in the simulator environment, `system` elsewhere
    #[serde(default)]
    pub metric_source: Option<SourceKind>,

    /// `provider=url` pairs probed by the system source
    #[serde(default)]
    pub provider_endpoints: Option<String>,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_sink_timeout_ms")]
    pub sink_timeout_ms: u64,

    /// Alertmanager-compatible webhook receiving actionable events
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    #[serde(default)]
    pub interval_ms: Option<u64>,

    #[serde(default)]
    pub alert_threshold: Option<f64>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_sink_timeout_ms() -> u64 {
    2_000
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

impl MonitorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("MONITOR").try_parsing(true))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        let loaded: Self = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read monitor configuration")?
            .try_deserialize()
            .context("Invalid monitor configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<()> {
        if self.history_capacity < MIN_HISTORY_CAPACITY {
            bail!(
                "MONITOR_HISTORY_CAPACITY must be at least {}, got {}",
                MIN_HISTORY_CAPACITY,
                self.history_capacity
            );
        }
        Ok(())
    }

    pub fn profile_overrides(&self) -> ProfileOverrides {
        ProfileOverrides {
            interval_ms: self.interval_ms,
            alert_threshold_percent: self.alert_threshold,
        }
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<MonitorConfig> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorConfig::from_source(
            config::Environment::with_prefix("MONITOR")
                .try_parsing(true)
                .source(Some(env)),
        )
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.environment.is_none());
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.sink_timeout(), Duration::from_secs(2));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.metric_source.is_none());
        assert!(config.profile_overrides().interval_ms.is_none());
    }

    #[test]
    fn test_environment_variables() {
        let config = load(&[
            ("MONITOR_ENVIRONMENT", "simulator"),
            ("MONITOR_API_PORT", "9100"),
            ("MONITOR_METRIC_SOURCE", "system"),
            ("MONITOR_LOG_FORMAT", "pretty"),
            ("MONITOR_INTERVAL_MS", "1500"),
            ("MONITOR_ALERT_THRESHOLD", "70.5"),
        ])
        .unwrap();

        assert_eq!(config.environment.as_deref(), Some("simulator"));
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.metric_source, Some(SourceKind::System));
        assert_eq!(config.log_format, LogFormat::Pretty);
        let overrides = config.profile_overrides();
        assert_eq!(overrides.interval_ms, Some(1500));
        assert_eq!(overrides.alert_threshold_percent, Some(70.5));
    }

    #[test]
    fn test_history_capacity_below_minimum_rejected() {
        for capacity in ["0", "1"] {
            let err = load(&[("MONITOR_HISTORY_CAPACITY", capacity)]).unwrap_err();
            assert!(err.to_string().contains("MONITOR_HISTORY_CAPACITY"));
        }
        let config = load(&[("MONITOR_HISTORY_CAPACITY", "2")]).unwrap();
        assert_eq!(config.history_capacity, MIN_HISTORY_CAPACITY);
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(load(&[("MONITOR_METRIC_SOURCE", "carrier-pigeon")]).is_err());
    }
}
