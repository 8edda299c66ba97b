//! Alertmanager-compatible webhook sink

use super::alerter::{AlertContext, Alerter};
use super::{async_trait, AlertSink};
use crate::models::MonitorEvent;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// POSTs actionable events to an Alertmanager-style webhook
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
    alerter: Alerter,
}

impl WebhookSink {
    pub fn new(url: Url, context: AlertContext, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self {
            client,
            url,
            alerter: Alerter::new(context),
        })
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.alerter = self.alerter.with_dedup_window(window);
        self
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn emit(&self, event: &MonitorEvent) -> Result<()> {
        let Some(alert) = self.alerter.alert_for(event) else {
            debug!(event = %event.kind(), "Event not actionable or suppressed");
            return Ok(());
        };

        let alertname = alert.labels.get("alertname").cloned().unwrap_or_default();
        let payload = Alerter::create_alertmanager_payload(vec![alert]);

        self.client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .context("Failed to send webhook request")?
            .error_for_status()
            .context("Webhook rejected alert")?;

        info!(alertname = %alertname, url = %self.url, "Alert delivered to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::models::Reading;
    use crate::profile::{Environment, Profile};
    use chrono::Utc;
    use mockito::Matcher;

    fn context() -> AlertContext {
        AlertContext {
            environment: "production".to_string(),
            instance: "node-1".to_string(),
            generator_url: None,
        }
    }

    fn verdict(cpu: f64) -> MonitorEvent {
        let profile = Profile::preset(Environment::Production);
        let reading = Reading::new(Utc::now(), cpu, 10.0, 10.0);
        MonitorEvent::Verdict(evaluate(&reading, &profile).unwrap())
    }

    fn sink(server: &mockito::Server) -> WebhookSink {
        let url = Url::parse(&format!("{}/alerts", server.url())).unwrap();
        WebhookSink::new(url, context(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_degraded_verdict_posted_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alerts")
            .match_body(Matcher::PartialJsonString(
                r#"{"alerts":[{"status":"firing","labels":{"alertname":"SystemHealthDegraded"}}]}"#
                    .to_string(),
            ))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let sink = sink(&server);
        sink.emit(&verdict(92.0)).await.unwrap();
        // Duplicate within the window is suppressed
        sink.emit(&verdict(93.0)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_healthy_verdict_not_posted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alerts")
            .expect(0)
            .create_async()
            .await;

        sink(&server).emit(&verdict(10.0)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/alerts")
            .with_status(500)
            .create_async()
            .await;

        let err = sink(&server).emit(&verdict(92.0)).await.unwrap_err();
        assert!(err.to_string().contains("Webhook rejected alert"));
    }
}
