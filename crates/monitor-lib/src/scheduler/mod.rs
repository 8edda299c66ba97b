//! Evaluation scheduler
//!
//! `Stopped -> Running -> Stopped`, restartable. `start` runs one tick
//! before returning and then hands the tick engine to a background task
//! that ticks every profile interval. A tick that overruns the interval
//! delays the next one; ticks never overlap and never burst to catch up.
//!
//! When the profile enables AI, a second task retrains the model every
//! [`RETRAIN_INTERVAL`] from the latest published history snapshot.

mod stats;
mod tick;

#[cfg(test)]
mod tests;

pub use stats::{SchedulerStats, StatsHandle};

use crate::error::MonitorError;
use crate::health::{components, HealthRegistry};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::predictor::{
    HistorySnapshot, Predictor, PredictorConfig, Retrainer, TrainedModel, RETRAIN_INTERVAL,
};
use crate::profile::Profile;
use crate::sink::SinkDispatcher;
use crate::source::MetricSource;
use anyhow::Result;
use stats::Counters;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tick::{TickEngine, TickOutcome};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

type ModelReceiver = watch::Receiver<Option<Arc<TrainedModel>>>;

/// Tasks spawned by a successful `start`
struct RunningTasks {
    shutdown: watch::Sender<bool>,
    evaluation: JoinHandle<TickEngine>,
    retraining: Option<JoinHandle<Retrainer>>,
}

/// Periodic evaluation driver
pub struct Scheduler {
    /// Present while stopped; moved into the evaluation task while running
    engine: Option<TickEngine>,
    retrainer: Option<Retrainer>,
    running: Option<RunningTasks>,
    health: HealthRegistry,
    stats: StatsHandle,
    snapshots: watch::Receiver<HistorySnapshot>,
    models: ModelReceiver,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Run the startup tick and begin ticking every `profile.interval_ms`
    ///
    /// Fails with [`MonitorError::SchedulerMisuse`] when already running.
    pub async fn start(&mut self, profile: Arc<Profile>) -> Result<(), MonitorError> {
        if self.running.is_some() {
            warn!("Scheduler start requested while already running");
            return Err(MonitorError::SchedulerMisuse(
                "start called while running".to_string(),
            ));
        }
        profile.validate()?;

        let mut engine = self.engine.take().ok_or_else(|| {
            MonitorError::TaskFailed("evaluation engine was lost by a failed run".to_string())
        })?;
        let logger = StructuredLogger::for_profile(&profile);

        self.stats.counters().running.store(true, Ordering::SeqCst);
        self.health.set_healthy(components::SCHEDULER).await;

        if let TickOutcome::Skipped(e) = engine.tick(&profile, &logger).await {
            debug!(error = %e, "Startup tick skipped");
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let period = profile.tick_interval();

        let retraining = match (profile.ai_enabled(), self.retrainer.take()) {
            (true, Some(retrainer)) => Some(tokio::spawn(run_retraining(
                retrainer,
                self.snapshots.clone(),
                shutdown_rx.clone(),
                logger.clone(),
                self.stats.counters(),
            ))),
            (_, retrainer) => {
                self.retrainer = retrainer;
                None
            }
        };
        let evaluation = tokio::spawn(run_evaluation(
            engine,
            profile.clone(),
            logger,
            period,
            shutdown_rx,
        ));

        info!(
            environment = %profile.environment,
            interval_ms = profile.interval_ms,
            retraining = retraining.is_some(),
            "Scheduler started"
        );

        self.running = Some(RunningTasks {
            shutdown,
            evaluation,
            retraining,
        });
        Ok(())
    }

    /// Cancel future ticks and wait for the in-flight one to finish
    ///
    /// Fails with [`MonitorError::SchedulerMisuse`] when already stopped and
    /// with [`MonitorError::TaskFailed`] when a background task panicked.
    pub async fn stop(&mut self) -> Result<(), MonitorError> {
        let Some(tasks) = self.running.take() else {
            warn!("Scheduler stop requested while already stopped");
            return Err(MonitorError::SchedulerMisuse(
                "stop called while stopped".to_string(),
            ));
        };

        tasks.shutdown.send_replace(true);
        let mut failure = None;

        match tasks.evaluation.await {
            Ok(engine) => self.engine = Some(engine),
            Err(e) => {
                failure = Some(MonitorError::TaskFailed(format!("evaluation loop: {}", e)));
            }
        }

        if let Some(retraining) = tasks.retraining {
            match retraining.await {
                Ok(retrainer) => self.retrainer = Some(retrainer),
                Err(e) => {
                    let (retrainer, models) = Retrainer::new();
                    self.retrainer = Some(retrainer);
                    self.models = models;
                    failure.get_or_insert(MonitorError::TaskFailed(format!(
                        "retraining loop: {}",
                        e
                    )));
                }
            }
        }

        self.stats.counters().running.store(false, Ordering::SeqCst);
        self.health
            .set_unhealthy(components::SCHEDULER, "scheduler stopped")
            .await;
        info!("Scheduler stopped");

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.snapshot()
    }

    /// Reader for the counters that outlives borrows of the scheduler
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Latest history published by the evaluation tick
    pub fn history_snapshots(&self) -> watch::Receiver<HistorySnapshot> {
        self.snapshots.clone()
    }

    /// Latest model produced by the retraining task
    pub fn trained_models(&self) -> ModelReceiver {
        self.models.clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(tasks) = &self.running {
            tasks.shutdown.send_replace(true);
        }
    }
}

async fn run_evaluation(
    mut engine: TickEngine,
    profile: Arc<Profile>,
    logger: StructuredLogger,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> TickEngine {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        // Runs outside the select so a stop request never interrupts a tick
        match engine.tick(&profile, &logger).await {
            TickOutcome::Completed { degraded } => debug!(degraded, "Evaluation tick complete"),
            TickOutcome::Skipped(e) => debug!(reason = e.kind(), "Evaluation tick skipped"),
        }
    }

    debug!("Evaluation loop exited");
    engine
}

async fn run_retraining(
    mut retrainer: Retrainer,
    snapshots: watch::Receiver<HistorySnapshot>,
    mut shutdown: watch::Receiver<bool>,
    logger: StructuredLogger,
    counters: Arc<Counters>,
) -> Retrainer {
    let metrics = MonitorMetrics::new();
    let mut ticker = interval_at(Instant::now() + RETRAIN_INTERVAL, RETRAIN_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = snapshots.borrow().clone();
        match retrainer.retrain(&snapshot) {
            Ok(model) => {
                metrics.inc_retrain_runs();
                Counters::bump(&counters.retrains, 1);
                logger.log_model_retrained(&model);
            }
            Err(e) => debug!(error = %e, "Retraining skipped"),
        }
    }

    retrainer
}

/// Builder for [`Scheduler`]
pub struct SchedulerBuilder {
    source: Option<Arc<dyn MetricSource>>,
    predictor: Option<Predictor>,
    dispatcher: SinkDispatcher,
    health: HealthRegistry,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            predictor: None,
            dispatcher: SinkDispatcher::default(),
            health: HealthRegistry::new(),
        }
    }

    /// Set the metric source
    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the predictor (defaults to an entropy-seeded predictor)
    pub fn predictor(mut self, predictor: Predictor) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn dispatcher(mut self, dispatcher: SinkDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Share a health registry with the API layer
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn build(self) -> Result<Scheduler> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Metric source is required"))?;
        let predictor = self
            .predictor
            .unwrap_or_else(|| Predictor::new(PredictorConfig::default()));

        let stats = StatsHandle::default();
        let (snapshot_tx, snapshots) = watch::channel(HistorySnapshot::default());
        let (retrainer, models) = Retrainer::new();

        let engine = TickEngine {
            source,
            predictor,
            dispatcher: self.dispatcher,
            health: self.health.clone(),
            snapshots: snapshot_tx,
            counters: stats.counters(),
            metrics: MonitorMetrics::new(),
        };

        Ok(Scheduler {
            engine: Some(engine),
            retrainer: Some(retrainer),
            running: None,
            health: self.health,
            stats,
            snapshots,
            models,
        })
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
