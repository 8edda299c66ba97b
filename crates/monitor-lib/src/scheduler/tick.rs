//! One evaluation tick
//!
//! Sample, evaluate, dispatch; then, for AI profiles, observe, scan for
//! anomalies and forecast. The engine is owned by exactly one task at a
//! time, which makes it the only writer of the rolling history.

use super::stats::Counters;
use crate::error::MonitorError;
use crate::evaluator::evaluate;
use crate::health::{components, HealthRegistry};
use crate::models::{AnomalyReport, MonitorEvent, Reading};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::predictor::{HistorySnapshot, Predictor};
use crate::profile::Profile;
use crate::sink::SinkDispatcher;
use crate::source::MetricSource;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// What happened on a tick
#[derive(Debug)]
pub(crate) enum TickOutcome {
    Completed { degraded: bool },
    Skipped(MonitorError),
}

pub(crate) struct TickEngine {
    pub(crate) source: Arc<dyn MetricSource>,
    pub(crate) predictor: Predictor,
    pub(crate) dispatcher: SinkDispatcher,
    pub(crate) health: HealthRegistry,
    pub(crate) snapshots: watch::Sender<HistorySnapshot>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) metrics: MonitorMetrics,
}

impl TickEngine {
    pub(crate) async fn tick(
        &mut self,
        profile: &Profile,
        logger: &StructuredLogger,
    ) -> TickOutcome {
        let started = Instant::now();

        let reading = match self.source.sample(profile).await {
            Ok(reading) => reading,
            Err(e) => {
                let error = MonitorError::Source(format!("{}: {:#}", self.source.name(), e));
                return self.skip(logger, error).await;
            }
        };

        let verdict = match evaluate(&reading, profile) {
            Ok(verdict) => verdict,
            Err(error) => return self.skip(logger, error).await,
        };
        self.health.set_healthy(components::METRIC_SOURCE).await;

        let degraded = verdict.overall.is_degraded();
        self.metrics.set_verdict_degraded(degraded);
        let mut sink_failures = self.dispatcher.dispatch(&MonitorEvent::Verdict(verdict)).await;

        if profile.ai_enabled() {
            sink_failures.extend(self.predict(reading, profile, logger).await);
        }
        self.report_sink_health(&sink_failures).await;

        self.metrics
            .observe_tick_latency(started.elapsed().as_secs_f64());
        self.metrics.inc_ticks_completed();
        Counters::bump(&self.counters.ticks_completed, 1);

        TickOutcome::Completed { degraded }
    }

    async fn predict(
        &mut self,
        reading: Reading,
        profile: &Profile,
        logger: &StructuredLogger,
    ) -> Vec<MonitorError> {
        let mut failures = Vec::new();
        let observed_at = reading.timestamp;

        self.predictor.observe(reading);
        let history = self.predictor.history();
        self.metrics.set_history_samples(history.len());
        self.snapshots.send_replace(Arc::new(history.to_vec()));

        let anomalies = self.predictor.detect_anomalies();
        if !anomalies.is_empty() {
            self.metrics.inc_anomalies(anomalies.len());
            Counters::bump(&self.counters.anomalies, anomalies.len() as u64);
            let report = AnomalyReport {
                detected_at: observed_at,
                anomalies,
            };
            failures.extend(self.dispatcher.dispatch(&MonitorEvent::Anomaly(report)).await);
        }

        match self.predictor.forecast(profile) {
            Ok(forecast) => {
                self.metrics.record_forecast(&forecast);
                Counters::bump(&self.counters.forecasts, 1);
                if forecast.alert_triggered {
                    Counters::bump(&self.counters.predictive_alerts, 1);
                }
                self.health.set_healthy(components::PREDICTOR).await;
                failures.extend(self.dispatcher.dispatch(&MonitorEvent::Forecast(forecast)).await);
            }
            Err(e) => {
                logger.log_forecast_skipped(&e.to_string());
                self.health
                    .set_degraded(components::PREDICTOR, e.to_string())
                    .await;
            }
        }

        failures
    }

    async fn skip(&self, logger: &StructuredLogger, error: MonitorError) -> TickOutcome {
        logger.log_tick_skipped(error.kind(), &error.to_string());
        self.metrics.inc_ticks_skipped(error.kind());
        Counters::bump(&self.counters.ticks_skipped, 1);
        self.health
            .set_degraded(components::METRIC_SOURCE, error.to_string())
            .await;
        TickOutcome::Skipped(error)
    }

    async fn report_sink_health(&self, failures: &[MonitorError]) {
        if failures.is_empty() {
            self.health.set_healthy(components::ALERT_SINK).await;
        } else {
            let message = failures
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            self.health
                .set_degraded(components::ALERT_SINK, message)
                .await;
        }
    }
}
