//! Monitoring profiles
//!
//! A profile is the immutable bundle of parameters selected once at startup
//! from the environment discriminator. The scheduler receives it by `Arc`;
//! nothing inside the library looks at process environment variables.

use crate::error::MonitorError;
use crate::models::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Deployment environment a profile is selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
    Simulator,
}

impl Environment {
    /// Resolve the discriminator, falling back to production when it is
    /// absent or unrecognized
    pub fn select(discriminator: Option<&str>) -> Self {
        match discriminator {
            None => Environment::Production,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(
                    discriminator = %raw,
                    fallback = %Environment::Production,
                    "Unrecognized environment, falling back"
                );
                Environment::Production
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Simulator => "simulator",
        }
    }
}

impl FromStr for Environment {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "development" => Ok(Environment::Development),
            "simulator" => Ok(Environment::Simulator),
            other => Err(MonitorError::InvalidProfile(format!(
                "unknown environment `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings that only exist when AI prediction is enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSettings {
    /// How far ahead forecasts look, in seconds
    pub predictive_window_secs: u64,
    pub cloud_providers: BTreeSet<ProviderId>,
    /// Opaque model location; inspected at startup, never parsed
    pub ml_model_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_endpoint: Option<String>,
}

/// Immutable monitoring configuration for one running instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Evaluation tick interval in milliseconds
    pub interval_ms: u64,
    /// Alert threshold, 0-100
    pub alert_threshold_percent: f64,
    pub debug_mode: bool,
    #[serde(default)]
    pub verbose_logging: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiSettings>,
}

/// Field overrides applied on top of a preset before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileOverrides {
    pub interval_ms: Option<u64>,
    pub alert_threshold_percent: Option<f64>,
}

impl Profile {
    /// Built-in profile for an environment
    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self {
                environment,
                version: None,
                interval_ms: 60_000,
                alert_threshold_percent: 80.0,
                debug_mode: false,
                verbose_logging: false,
                ai: None,
            },
            Environment::Development => Self {
                environment,
                version: None,
                interval_ms: 5_000,
                alert_threshold_percent: 90.0,
                debug_mode: true,
                verbose_logging: true,
                ai: None,
            },
            Environment::Simulator => Self {
                environment,
                version: Some("v3.0-alpha".to_string()),
                interval_ms: 30_000,
                alert_threshold_percent: 75.0,
                debug_mode: true,
                verbose_logging: false,
                ai: Some(AiSettings {
                    predictive_window_secs: 300,
                    cloud_providers: ["aws", "azure", "gcp"]
                        .into_iter()
                        .map(ProviderId::new)
                        .collect(),
                    ml_model_path: PathBuf::from("./models/anomaly-detection.h5"),
                    metrics_endpoint: Some("http://localhost:9000/metrics".to_string()),
                }),
            },
        }
    }

    /// Select the preset for a discriminator, apply overrides and validate
    pub fn select(
        discriminator: Option<&str>,
        overrides: &ProfileOverrides,
    ) -> Result<Self, MonitorError> {
        let mut profile = Self::preset(Environment::select(discriminator));
        if let Some(interval_ms) = overrides.interval_ms {
            profile.interval_ms = interval_ms;
        }
        if let Some(threshold) = overrides.alert_threshold_percent {
            profile.alert_threshold_percent = threshold;
        }
        profile.validate()?;
        Ok(profile)
    }

    /// Check field ranges; called before a profile is handed to the scheduler
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.interval_ms == 0 {
            return Err(MonitorError::InvalidProfile(
                "interval must be a positive number of milliseconds".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.alert_threshold_percent) {
            return Err(MonitorError::InvalidProfile(format!(
                "alert threshold {} is outside 0-100",
                self.alert_threshold_percent
            )));
        }
        if let Some(ai) = &self.ai {
            if ai.predictive_window_secs == 0 {
                return Err(MonitorError::InvalidProfile(
                    "predictive window must be positive".to_string(),
                ));
            }
            if ai.cloud_providers.is_empty() {
                return Err(MonitorError::InvalidProfile(
                    "AI profiles need at least one cloud provider".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai.is_some()
    }

    /// Providers every reading must report; empty without AI
    pub fn cloud_providers(&self) -> impl Iterator<Item = &ProviderId> {
        self.ai.iter().flat_map(|ai| ai.cloud_providers.iter())
    }

    /// Forecast horizon; zero when AI is disabled
    pub fn predictive_window(&self) -> Duration {
        self.ai
            .as_ref()
            .map(|ai| Duration::from_secs(ai.predictive_window_secs))
            .unwrap_or_default()
    }
}
