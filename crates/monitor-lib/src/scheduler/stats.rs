//! Scheduler counters shared between the tick tasks and readers

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) running: AtomicBool,
    pub(crate) ticks_completed: AtomicU64,
    pub(crate) ticks_skipped: AtomicU64,
    pub(crate) forecasts: AtomicU64,
    pub(crate) predictive_alerts: AtomicU64,
    pub(crate) anomalies: AtomicU64,
    pub(crate) retrains: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub ticks_completed: u64,
    pub ticks_skipped: u64,
    pub forecasts: u64,
    pub predictive_alerts: u64,
    pub anomalies: u64,
    pub retrains: u64,
}

/// Cheap clonable reader for a scheduler's counters
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    counters: Arc<Counters>,
}

impl StatsHandle {
    pub(crate) fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    pub fn snapshot(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            running: c.running.load(Ordering::SeqCst),
            ticks_completed: c.ticks_completed.load(Ordering::Relaxed),
            ticks_skipped: c.ticks_skipped.load(Ordering::Relaxed),
            forecasts: c.forecasts.load(Ordering::Relaxed),
            predictive_alerts: c.predictive_alerts.load(Ordering::Relaxed),
            anomalies: c.anomalies.load(Ordering::Relaxed),
            retrains: c.retrains.load(Ordering::Relaxed),
        }
    }
}
