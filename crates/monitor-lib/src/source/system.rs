//! Host metrics via sysinfo
//!
//! CPU, memory and root-disk usage come from the local machine. Cloud
//! provider status comes from an HTTP probe of each provider's configured
//! status endpoint.

use super::{async_trait, MetricSource};
use crate::models::{HealthStatus, ProviderId, Reading};
use crate::profile::Profile;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Disks, System};
use tracing::debug;
use url::Url;

/// Default timeout for a single provider status request
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Checks cloud provider status endpoints over HTTP
#[derive(Debug, Clone)]
pub struct ProviderProbe {
    client: reqwest::Client,
    endpoints: BTreeMap<ProviderId, Url>,
}

impl ProviderProbe {
    pub fn new(endpoints: BTreeMap<ProviderId, Url>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build provider probe client")?;
        Ok(Self { client, endpoints })
    }

    /// Parse `provider=url` pairs separated by commas
    pub fn parse_endpoints(spec: &str) -> Result<BTreeMap<ProviderId, Url>> {
        let mut endpoints = BTreeMap::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (provider, url) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected provider=url, got `{}`", pair))?;
            let provider = ProviderId::new(provider);
            if provider.as_str().is_empty() {
                bail!("empty provider name in `{}`", pair);
            }
            let url = Url::parse(url.trim())
                .with_context(|| format!("invalid status URL for provider {}", provider))?;
            endpoints.insert(provider, url);
        }
        Ok(endpoints)
    }

    /// Healthy on a 2xx answer; degraded on anything else, including a
    /// missing endpoint, since the provider's health cannot be confirmed
    pub async fn check(&self, provider: &ProviderId) -> HealthStatus {
        let Some(url) = self.endpoints.get(provider) else {
            debug!(provider = %provider, "No status endpoint configured");
            return HealthStatus::Degraded;
        };

        match self.client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => {
                debug!(
                    provider = %provider,
                    status = %response.status(),
                    "Provider reported failure"
                );
                HealthStatus::Degraded
            }
            Err(e) => {
                debug!(provider = %provider, error = %e, "Provider probe failed");
                HealthStatus::Degraded
            }
        }
    }
}

/// Samples the local host
pub struct SystemSource {
    system: Arc<Mutex<System>>,
    probe: Option<ProviderProbe>,
}

impl SystemSource {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime CPU counters so the first sample has a delta to work with
        system.refresh_cpu();
        Self {
            system: Arc::new(Mutex::new(system)),
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: ProviderProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    fn sample_host(system: &Mutex<System>) -> Result<(f64, f64, f64)> {
        let mut sys = system
            .lock()
            .map_err(|_| anyhow!("system sampler lock poisoned"))?;
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpu = sys.global_cpu_info().cpu_usage() as f64;
        let total = sys.total_memory();
        let memory = if total > 0 {
            (total - sys.available_memory().min(total)) as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| disks.list().first())
            .ok_or_else(|| anyhow!("no disks reported"))?;
        let disk = if root.total_space() > 0 {
            (root.total_space() - root.available_space().min(root.total_space())) as f64
                / root.total_space() as f64
                * 100.0
        } else {
            0.0
        };

        Ok((cpu.clamp(0.0, 100.0), memory, disk))
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for SystemSource {
    fn name(&self) -> &str {
        "system"
    }

    async fn sample(&self, profile: &Profile) -> Result<Reading> {
        let system = self.system.clone();
        let (cpu, memory, disk) = tokio::task::spawn_blocking(move || Self::sample_host(&system))
            .await
            .context("Host sampling task failed")??;

        let mut reading = Reading::new(Utc::now(), cpu, memory, disk);
        for provider in profile.cloud_providers() {
            let status = match &self.probe {
                Some(probe) => probe.check(provider).await,
                None => HealthStatus::Degraded,
            };
            reading.provider_status.insert(provider.clone(), status);
        }
        Ok(reading)
    }
}
