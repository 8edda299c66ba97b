//! In-memory sink holding the latest event of each kind

use super::{async_trait, AlertSink};
use crate::models::{AnomalyReport, Forecast, HealthVerdict, MonitorEvent};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Latest events seen by a [`StatusSink`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub verdict: Option<HealthVerdict>,
    pub forecast: Option<Forecast>,
    pub anomalies: Option<AnomalyReport>,
    pub events_seen: u64,
}

/// Keeps the most recent verdict, forecast and anomaly report for readers
/// such as the HTTP status endpoint
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    latest: Arc<RwLock<StatusSnapshot>>,
}

impl StatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.latest.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for StatusSink {
    fn name(&self) -> &str {
        "status"
    }

    async fn emit(&self, event: &MonitorEvent) -> Result<()> {
        let mut latest = self.latest.write().await;
        latest.events_seen += 1;
        match event {
            MonitorEvent::Verdict(v) => latest.verdict = Some(v.clone()),
            MonitorEvent::Forecast(f) => latest.forecast = Some(f.clone()),
            MonitorEvent::Anomaly(a) => latest.anomalies = Some(a.clone()),
        }
        Ok(())
    }
}
