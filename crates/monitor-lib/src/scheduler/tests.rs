//! Scheduler lifecycle tests
//!
//! All of these run on tokio's paused clock, so intervals of seconds or
//! minutes elapse instantly and deterministically.

use super::*;
use crate::models::{HealthStatus, MonitorEvent, Reading};
use crate::predictor::{NoNoise, DEFAULT_HISTORY_CAPACITY};
use crate::profile::Environment;
use crate::sink::AlertSink;
use crate::source::{async_trait, ScriptedSource};
use crate::health::ComponentStatus;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::sleep;

/// Records every event it receives
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingSink {
    fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn emit(&self, event: &MonitorEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Slow source that records how many samples were in flight at once
struct ConcurrencyTracker {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: AtomicUsize,
}

impl ConcurrencyTracker {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetricSource for ConcurrencyTracker {
    fn name(&self) -> &str {
        "tracker"
    }

    async fn sample(&self, _profile: &Profile) -> anyhow::Result<Reading> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(reading(30.0))
    }
}

fn reading(cpu: f64) -> Reading {
    Reading::new(Utc::now(), cpu, 40.0, 50.0)
        .with_provider("aws", HealthStatus::Healthy)
        .with_provider("azure", HealthStatus::Healthy)
        .with_provider("gcp", HealthStatus::Healthy)
}

fn profile(environment: Environment, interval_ms: u64) -> Arc<Profile> {
    let mut profile = Profile::preset(environment);
    profile.interval_ms = interval_ms;
    Arc::new(profile)
}

fn scheduler(source: Arc<dyn MetricSource>, sink: Arc<RecordingSink>) -> Scheduler {
    Scheduler::builder()
        .source(source)
        .predictor(Predictor::with_noise(PredictorConfig::default(), NoNoise))
        .dispatcher(SinkDispatcher::default().with_sink(sink))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_start_then_stop_runs_exactly_one_tick() {
    let source = Arc::new(ScriptedSource::new(vec![reading(10.0)]));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink.clone());

    scheduler
        .start(profile(Environment::Production, 60_000))
        .await
        .unwrap();
    assert!(scheduler.is_running());
    scheduler.stop().await.unwrap();

    sleep(Duration::from_secs(600)).await;

    assert_eq!(source.samples_taken(), 1);
    assert_eq!(sink.count("verdict"), 1);
    assert_eq!(scheduler.stats().ticks_completed, 1);
    assert!(!scheduler.is_running());
    assert!(!scheduler.stats().running);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_every_interval_after_startup_tick() {
    let source = Arc::new(ScriptedSource::new(vec![reading(10.0)]));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink.clone());

    scheduler
        .start(profile(Environment::Development, 1_000))
        .await
        .unwrap();
    assert_eq!(source.samples_taken(), 1);

    // Timer ticks at 1s, 2s and 3s
    sleep(Duration::from_millis(3_500)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(source.samples_taken(), 4);
    assert_eq!(sink.count("verdict"), 4);
    // No forecasts without AI
    assert_eq!(sink.count("forecast"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_ticks_never_overlap() {
    let source = Arc::new(ConcurrencyTracker::new(Duration::from_millis(2_500)));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink);

    scheduler
        .start(profile(Environment::Development, 1_000))
        .await
        .unwrap();
    sleep(Duration::from_secs(20)).await;
    scheduler.stop().await.unwrap();

    let started = source.started.load(Ordering::SeqCst);
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(started >= 2);
    // Overrunning ticks are delayed rather than queued up
    assert!(started <= 1 + 20_000 / 2_500 + 1, "{} ticks started", started);
    assert_eq!(scheduler.stats().ticks_completed as usize, started);
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_tick() {
    let source = Arc::new(
        ScriptedSource::new(vec![reading(10.0)]).with_delay(Duration::from_millis(2_500)),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink.clone());

    scheduler
        .start(profile(Environment::Development, 1_000))
        .await
        .unwrap();

    // Second tick starts one interval after the startup tick finished
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(source.samples_taken(), 2);

    let stopping = Instant::now();
    scheduler.stop().await.unwrap();

    assert!(stopping.elapsed() >= Duration::from_millis(2_000));
    assert_eq!(scheduler.stats().ticks_completed, 2);
    assert_eq!(sink.count("verdict"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_source_failure_skips_tick_and_keeps_ticking() {
    let source = Arc::new(
        ScriptedSource::new(vec![reading(10.0)])
            .then_fail("sensor offline")
            .then_reading(reading(20.0)),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink.clone());

    scheduler
        .start(profile(Environment::Development, 1_000))
        .await
        .unwrap();

    sleep(Duration::from_millis(1_500)).await;
    let stats = scheduler.stats();
    assert_eq!(stats.ticks_completed, 1);
    assert_eq!(stats.ticks_skipped, 1);
    let source_health = scheduler
        .health()
        .component(components::METRIC_SOURCE)
        .await
        .unwrap();
    assert_eq!(source_health.status, ComponentStatus::Degraded);
    assert!(source_health.message.unwrap().contains("sensor offline"));

    sleep(Duration::from_millis(1_000)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(scheduler.stats().ticks_completed, 2);
    assert_eq!(sink.count("verdict"), 2);
    let source_health = scheduler
        .health()
        .component(components::METRIC_SOURCE)
        .await
        .unwrap();
    assert_eq!(source_health.status, ComponentStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_reading_is_skipped() {
    let source = Arc::new(ScriptedSource::new(vec![reading(150.0)]).then_reading(reading(10.0)));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source, sink.clone());

    scheduler
        .start(profile(Environment::Development, 1_000))
        .await
        .unwrap();
    assert_eq!(sink.count("verdict"), 0);
    assert_eq!(scheduler.stats().ticks_skipped, 1);

    sleep(Duration::from_millis(1_500)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(sink.count("verdict"), 1);
    assert_eq!(scheduler.stats().ticks_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_misuse_is_reported() {
    let source = Arc::new(ScriptedSource::new(vec![reading(10.0)]));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink);

    assert!(matches!(
        scheduler.stop().await,
        Err(MonitorError::SchedulerMisuse(_))
    ));

    let p = profile(Environment::Development, 1_000);
    scheduler.start(p.clone()).await.unwrap();
    assert!(matches!(
        scheduler.start(p).await,
        Err(MonitorError::SchedulerMisuse(_))
    ));
    // The rejected start neither ticked nor stopped the running loop
    assert_eq!(source.samples_taken(), 1);
    assert!(scheduler.is_running());

    scheduler.stop().await.unwrap();
    assert!(matches!(
        scheduler.stop().await,
        Err(MonitorError::SchedulerMisuse(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let source = Arc::new(ScriptedSource::new(vec![reading(10.0)]));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink);
    let p = profile(Environment::Development, 1_000);

    scheduler.start(p.clone()).await.unwrap();
    scheduler.stop().await.unwrap();
    scheduler.start(p).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(source.samples_taken(), 3);
    assert_eq!(scheduler.stats().ticks_completed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_profile_rejected() {
    let source = Arc::new(ScriptedSource::new(vec![reading(10.0)]));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source.clone(), sink);

    let err = scheduler
        .start(profile(Environment::Development, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::InvalidProfile(_)));
    assert!(!scheduler.is_running());
    assert_eq!(source.samples_taken(), 0);

    scheduler
        .start(profile(Environment::Development, 1_000))
        .await
        .unwrap();
    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_ai_profile_forecasts_and_retrains() {
    let source = Arc::new(ScriptedSource::new(vec![reading(30.0)]));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(source, sink.clone());
    let models = scheduler.trained_models();
    let snapshots = scheduler.history_snapshots();

    scheduler
        .start(profile(Environment::Simulator, 1_000))
        .await
        .unwrap();
    assert_eq!(sink.count("forecast"), 1);
    assert_eq!(snapshots.borrow().len(), 1);
    assert!(models.borrow().is_none());

    sleep(RETRAIN_INTERVAL + Duration::from_secs(1)).await;
    scheduler.stop().await.unwrap();

    let stats = scheduler.stats();
    assert_eq!(stats.retrains, 1);
    assert_eq!(stats.forecasts, stats.ticks_completed);
    assert_eq!(sink.count("forecast") as u64, stats.forecasts);
    assert_eq!(snapshots.borrow().len(), DEFAULT_HISTORY_CAPACITY);

    let model = models.borrow().clone().unwrap();
    assert_eq!(model.version, 1);
    assert_eq!(model.samples, DEFAULT_HISTORY_CAPACITY);
}

#[tokio::test(start_paused = true)]
async fn test_anomaly_dispatched_for_outlier() {
    let baseline = [20.0, 22.0, 20.0, 22.0, 20.0, 22.0];
    let mut source = ScriptedSource::new(baseline.iter().map(|cpu| reading(*cpu)));
    source = source.then_reading(reading(70.0));
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = scheduler(Arc::new(source), sink.clone());

    scheduler
        .start(profile(Environment::Simulator, 1_000))
        .await
        .unwrap();
    sleep(Duration::from_millis(6_500)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(sink.count("anomaly"), 1);
    assert_eq!(scheduler.stats().anomalies, 1);
}

#[test]
fn test_builder_requires_source() {
    assert!(Scheduler::builder().build().is_err());
}

/// Panics on one chosen delivery and accepts every other
struct PanicOnceSink {
    panic_on: usize,
    delivered: AtomicUsize,
}

#[async_trait]
impl AlertSink for PanicOnceSink {
    fn name(&self) -> &str {
        "panic-once"
    }

    async fn emit(&self, _event: &MonitorEvent) -> anyhow::Result<()> {
        if self.delivered.fetch_add(1, Ordering::SeqCst) + 1 == self.panic_on {
            panic!("sink bug");
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_sink_does_not_stop_ticking() {
    let source = Arc::new(ScriptedSource::new(vec![reading(10.0)]));
    let sink = Arc::new(PanicOnceSink {
        panic_on: 2,
        delivered: AtomicUsize::new(0),
    });
    let mut scheduler = Scheduler::builder()
        .source(source.clone())
        .dispatcher(SinkDispatcher::default().with_sink(sink.clone()))
        .build()
        .unwrap();
    let profile = profile(Environment::Development, 1_000);

    scheduler.start(profile.clone()).await.unwrap();
    sleep(Duration::from_millis(10_500)).await;

    assert_eq!(source.samples_taken(), 11);
    assert_eq!(scheduler.stats().ticks_completed, 11);
    assert_eq!(sink.delivered.load(Ordering::SeqCst), 11);
    assert!(scheduler.is_running());

    scheduler.stop().await.unwrap();
    scheduler.start(profile).await.unwrap();
    assert_eq!(source.samples_taken(), 12);
    scheduler.stop().await.unwrap();
}
