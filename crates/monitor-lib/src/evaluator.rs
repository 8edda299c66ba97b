//! Threshold evaluation
//!
//! Turns one reading into a health verdict. Pure and deterministic: no I/O,
//! no clock, no state.

use crate::error::MonitorError;
use crate::models::{HealthStatus, HealthVerdict, Metric, MetricCheck, Reading};
use crate::profile::Profile;
use std::collections::BTreeMap;

/// Classify a reading against the profile's alert threshold
///
/// A metric is degraded when its value is strictly above the threshold; the
/// verdict is degraded when any metric or any configured provider is.
pub fn evaluate(reading: &Reading, profile: &Profile) -> Result<HealthVerdict, MonitorError> {
    validate(reading, profile)?;

    let threshold = profile.alert_threshold_percent;
    let check = |value: f64| MetricCheck {
        value_percent: value,
        threshold_percent: threshold,
        status: if value > threshold {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        },
    };

    let cpu = check(reading.cpu_percent);
    let memory = check(reading.memory_percent);
    let disk = check(reading.disk_percent);

    // Only configured providers count; extra entries in the reading are ignored
    let providers: BTreeMap<_, _> = profile
        .cloud_providers()
        .filter_map(|id| {
            reading
                .provider_status
                .get(id)
                .map(|status| (id.clone(), *status))
        })
        .collect();

    let any_degraded = [cpu.status, memory.status, disk.status]
        .iter()
        .chain(providers.values())
        .any(HealthStatus::is_degraded);

    Ok(HealthVerdict {
        timestamp: reading.timestamp,
        overall: if any_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        },
        cpu,
        memory,
        disk,
        providers,
    })
}

fn validate(reading: &Reading, profile: &Profile) -> Result<(), MonitorError> {
    for metric in Metric::ALL {
        let value = metric.value_in(reading);
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(MonitorError::InvalidReading(format!(
                "{} value {} is not a percentage",
                metric, value
            )));
        }
    }

    if let Some(traffic) = reading.traffic_units {
        if !traffic.is_finite() || traffic < 0.0 {
            return Err(MonitorError::InvalidReading(format!(
                "traffic value {} is not a non-negative number",
                traffic
            )));
        }
    }

    if let Some(missing) = profile
        .cloud_providers()
        .find(|id| !reading.provider_status.contains_key(*id))
    {
        return Err(MonitorError::InvalidReading(format!(
            "missing status for provider `{}`",
            missing
        )));
    }

    Ok(())
}
