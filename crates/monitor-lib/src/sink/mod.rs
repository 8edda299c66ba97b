//! Alert sinks
//!
//! Sinks receive every verdict, forecast and anomaly event. The dispatcher
//! bounds each delivery with a timeout: a slow sink loses the event, it
//! never stalls the tick.

mod alerter;
mod channel;
mod log;
mod status;
mod webhook;

pub use alerter::{
    AlertContext, AlertSeverity, AlertType, Alerter, AlertmanagerAlert, AlertmanagerPayload,
};
pub use channel::ChannelSink;
pub use log::LogSink;
pub use status::{StatusSink, StatusSnapshot};
pub use webhook::WebhookSink;

use crate::error::MonitorError;
use crate::models::MonitorEvent;
use crate::observability::MonitorMetrics;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use async_trait::async_trait;

/// Default time a sink gets to accept one event
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(2);

/// Trait for alert/health event consumers
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Deliver one event
    async fn emit(&self, event: &MonitorEvent) -> Result<()>;
}

/// Delivers events to every registered sink under a timeout
#[derive(Clone)]
pub struct SinkDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
    timeout: Duration,
    metrics: MonitorMetrics,
}

impl SinkDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            timeout,
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver `event` to each sink in turn
    ///
    /// Each delivery runs in its own task, so a panicking sink is reported
    /// like a failing one. Failures are logged and returned; they are never
    /// retried.
    pub async fn dispatch(&self, event: &MonitorEvent) -> Vec<MonitorError> {
        let shared = Arc::new(event.clone());
        let mut errors = Vec::new();

        for sink in &self.sinks {
            let delivery = {
                let sink = Arc::clone(sink);
                let event = Arc::clone(&shared);
                tokio::spawn(async move { sink.emit(&event).await })
            };
            let abort = delivery.abort_handle();

            let reason = match tokio::time::timeout(self.timeout, delivery).await {
                Ok(Ok(Ok(()))) => continue,
                Ok(Ok(Err(e))) => e.to_string(),
                Ok(Err(join_error)) => format!("sink task failed: {}", join_error),
                Err(_) => {
                    abort.abort();
                    warn!(
                        sink = %sink.name(),
                        event = %event.kind(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Alert sink timed out, dropping event"
                    );
                    self.metrics.inc_sink_timeouts();
                    errors.push(MonitorError::SinkTimeout {
                        sink: sink.name().to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                    continue;
                }
            };

            warn!(
                sink = %sink.name(),
                event = %event.kind(),
                error = %reason,
                "Alert sink failed"
            );
            self.metrics.inc_sink_errors();
            errors.push(MonitorError::Sink {
                sink: sink.name().to_string(),
                reason,
            });
        }

        errors
    }
}

impl Default for SinkDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnomalyReport, MonitorEvent};
    use anyhow::bail;
    use chrono::Utc;

    struct StallingSink;

    #[async_trait]
    impl AlertSink for StallingSink {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn emit(&self, _event: &MonitorEvent) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn emit(&self, _event: &MonitorEvent) -> Result<()> {
            bail!("connection refused")
        }
    }

    struct PanickingSink;

    #[async_trait]
    impl AlertSink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn emit(&self, _event: &MonitorEvent) -> Result<()> {
            panic!("sink bug")
        }
    }

    fn event() -> MonitorEvent {
        MonitorEvent::Anomaly(AnomalyReport {
            detected_at: Utc::now(),
            anomalies: vec![],
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_sink_is_dropped_and_others_still_receive() {
        let (channel, mut rx) = ChannelSink::new(4);
        let dispatcher = SinkDispatcher::new(Duration::from_millis(100))
            .with_sink(Arc::new(StallingSink))
            .with_sink(Arc::new(channel));

        let started = tokio::time::Instant::now();
        let errors = dispatcher.dispatch(&event()).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            MonitorError::SinkTimeout { sink, timeout_ms: 100 } if sink == "stalling"
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_sink_error_reported() {
        let dispatcher = SinkDispatcher::default().with_sink(Arc::new(FailingSink));
        let errors = dispatcher.dispatch(&event()).await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_panicking_sink_reported_and_others_still_receive() {
        let (channel, mut rx) = ChannelSink::new(4);
        let dispatcher = SinkDispatcher::default()
            .with_sink(Arc::new(PanickingSink))
            .with_sink(Arc::new(channel));

        let errors = dispatcher.dispatch(&event()).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            MonitorError::Sink { sink, reason }
                if sink == "panicking" && reason.contains("panicked")
        ));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_empty_dispatcher() {
        let dispatcher = SinkDispatcher::default();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.dispatch(&event()).await.is_empty());
    }
}
