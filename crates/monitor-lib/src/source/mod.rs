//! Metric sources
//!
//! A source is polled once per tick and returns a timestamped reading with
//! CPU, memory and disk percentages plus the status of every cloud provider
//! the profile monitors.

mod scripted;
mod simulated;
mod system;

pub use scripted::ScriptedSource;
pub use simulated::SimulatedSource;
pub use system::{ProviderProbe, SystemSource, DEFAULT_PROBE_TIMEOUT};

use crate::models::Reading;
use crate::profile::Profile;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for metric sampling implementations
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Take one reading for the given profile
    async fn sample(&self, profile: &Profile) -> Result<Reading>;
}
