//! Bounded in-process channel sink

use super::{async_trait, AlertSink};
use crate::models::MonitorEvent;
use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

/// Forwards events into a bounded mpsc channel
///
/// A full channel makes `emit` wait, which the dispatcher turns into a
/// dropped event once its timeout elapses.
pub struct ChannelSink {
    tx: mpsc::Sender<MonitorEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MonitorEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn emit(&self, event: &MonitorEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| anyhow!("event receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnomalyReport;
    use chrono::Utc;

    fn event() -> MonitorEvent {
        MonitorEvent::Anomaly(AnomalyReport {
            detected_at: Utc::now(),
            anomalies: vec![],
        })
    }

    #[tokio::test]
    async fn test_forwards_events() {
        let (sink, mut rx) = ChannelSink::new(2);
        sink.emit(&event()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind(), "anomaly");
    }

    #[tokio::test]
    async fn test_closed_receiver_is_an_error() {
        let (sink, rx) = ChannelSink::new(2);
        drop(rx);
        assert!(sink.emit(&event()).await.is_err());
    }
}
