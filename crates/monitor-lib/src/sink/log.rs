//! Sink that writes events to the structured log

use super::{async_trait, AlertSink};
use crate::models::MonitorEvent;
use crate::observability::StructuredLogger;
use anyhow::Result;

pub struct LogSink {
    logger: StructuredLogger,
}

impl LogSink {
    pub fn new(logger: StructuredLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn emit(&self, event: &MonitorEvent) -> Result<()> {
        match event {
            MonitorEvent::Verdict(verdict) => self.logger.log_verdict(verdict),
            MonitorEvent::Forecast(forecast) => self.logger.log_forecast(forecast),
            MonitorEvent::Anomaly(report) => self.logger.log_anomalies(report),
        }
        Ok(())
    }
}
