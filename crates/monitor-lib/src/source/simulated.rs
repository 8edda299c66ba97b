//! Simulated source for the simulator environment
//!
//! Host metrics hover around steady baselines and each cloud provider
//! reports degraded roughly one sample in ten.

use super::{async_trait, MetricSource};
use crate::models::{HealthStatus, Reading};
use crate::predictor::BoundedNoise;
use crate::profile::Profile;
use anyhow::Result;
use chrono::Utc;

/// Probability that a provider reports healthy on a given sample
pub const PROVIDER_HEALTHY_PROBABILITY: f64 = 0.9;

/// Upper bound for simulated traffic units
pub const MAX_TRAFFIC_UNITS: f64 = 1000.0;

#[derive(Debug, Clone, Copy)]
struct Baseline {
    center: f64,
    jitter: f64,
}

impl Baseline {
    fn sample(&self, rng: &BoundedNoise) -> f64 {
        let offset = (rng.next_unit() * 2.0 - 1.0) * self.jitter;
        (self.center + offset).clamp(0.0, 100.0)
    }
}

/// Pseudo-random readings around fixed baselines
pub struct SimulatedSource {
    rng: BoundedNoise,
    cpu: Baseline,
    memory: Baseline,
    disk: Baseline,
    provider_healthy_probability: f64,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::with_rng(BoundedNoise::from_entropy())
    }

    /// Reproducible simulation
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(BoundedNoise::with_seed(seed))
    }

    fn with_rng(rng: BoundedNoise) -> Self {
        Self {
            rng,
            cpu: Baseline {
                center: 35.0,
                jitter: 10.0,
            },
            memory: Baseline {
                center: 55.0,
                jitter: 5.0,
            },
            disk: Baseline {
                center: 60.0,
                jitter: 1.0,
            },
            provider_healthy_probability: PROVIDER_HEALTHY_PROBABILITY,
        }
    }

    /// Override the chance that each provider reports healthy
    pub fn with_provider_health(mut self, probability: f64) -> Self {
        self.provider_healthy_probability = probability.clamp(0.0, 1.0);
        self
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn sample(&self, profile: &Profile) -> Result<Reading> {
        let mut reading = Reading::new(
            Utc::now(),
            self.cpu.sample(&self.rng),
            self.memory.sample(&self.rng),
            self.disk.sample(&self.rng),
        )
        .with_traffic(self.rng.next_unit() * MAX_TRAFFIC_UNITS);

        for provider in profile.cloud_providers() {
            let status = if self.rng.next_unit() < self.provider_healthy_probability {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            };
            reading.provider_status.insert(provider.clone(), status);
        }

        Ok(reading)
    }
}
