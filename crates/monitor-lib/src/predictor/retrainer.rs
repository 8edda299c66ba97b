//! Background model retraining
//!
//! Fits per-metric baselines over a published history snapshot. The
//! retrainer only ever reads snapshots; it never touches the live history.

use super::trend::{linear_regression_slope, mean_std_dev};
use crate::error::MonitorError;
use crate::models::{Metric, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Fixed retraining period
pub const RETRAIN_INTERVAL: Duration = Duration::from_secs(120);

/// Immutable history snapshot shared with readers
pub type HistorySnapshot = Arc<Vec<Reading>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub mean: f64,
    pub std_dev: f64,
    /// Trend in percentage points per second
    pub slope_per_sec: f64,
}

/// Output of one retraining pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
    pub baselines: BTreeMap<Metric, MetricBaseline>,
}

/// Produces a new [`TrainedModel`] from each snapshot it is given
pub struct Retrainer {
    version: u64,
    publisher: watch::Sender<Option<Arc<TrainedModel>>>,
}

impl Retrainer {
    pub fn new() -> (Self, watch::Receiver<Option<Arc<TrainedModel>>>) {
        let (publisher, rx) = watch::channel(None);
        (
            Self {
                version: 0,
                publisher,
            },
            rx,
        )
    }

    /// Fit baselines over `snapshot` and publish the result
    pub fn retrain(&mut self, snapshot: &[Reading]) -> Result<Arc<TrainedModel>, MonitorError> {
        let origin = snapshot.first().ok_or(MonitorError::InsufficientData)?.timestamp;

        let baselines = Metric::ALL
            .into_iter()
            .map(|metric| {
                let values: Vec<f64> = snapshot.iter().map(|r| metric.value_in(r)).collect();
                let points: Vec<(f64, f64)> = snapshot
                    .iter()
                    .map(|r| (seconds_between(origin, r.timestamp), metric.value_in(r)))
                    .collect();
                let (mean, std_dev) = mean_std_dev(&values);
                let baseline = MetricBaseline {
                    mean,
                    std_dev,
                    slope_per_sec: linear_regression_slope(&points),
                };
                (metric, baseline)
            })
            .collect();

        self.version += 1;
        let model = Arc::new(TrainedModel {
            version: self.version,
            trained_at: Utc::now(),
            samples: snapshot.len(),
            baselines,
        });
        self.publisher.send_replace(Some(model.clone()));
        Ok(model)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<TrainedModel>>> {
        self.publisher.subscribe()
    }
}

pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
