//! Deterministic source that replays a fixed sequence of readings

use super::{async_trait, MetricSource};
use crate::models::Reading;
use crate::profile::Profile;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

enum Step {
    Reading(Reading),
    Failure(String),
}

/// Replays scripted readings in order
///
/// Once the script is exhausted the last reading is repeated with a fresh
/// timestamp. An optional delay makes each sample take a fixed amount of
/// (tokio) time.
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Reading>>,
    delay: Option<Duration>,
    samples_taken: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(readings: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            steps: Mutex::new(readings.into_iter().map(Step::Reading).collect()),
            last: Mutex::new(None),
            delay: None,
            samples_taken: AtomicUsize::new(0),
        }
    }

    /// Make every sample take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a failing sample after the readings scripted so far
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.lock_steps().push_back(Step::Failure(message.into()));
        self
    }

    /// Queue another reading
    pub fn then_reading(self, reading: Reading) -> Self {
        self.lock_steps().push_back(Step::Reading(reading));
        self
    }

    pub fn samples_taken(&self) -> usize {
        self.samples_taken.load(Ordering::SeqCst)
    }

    fn lock_steps(&self) -> std::sync::MutexGuard<'_, VecDeque<Step>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_step(&self) -> Result<Reading> {
        let step = self.lock_steps().pop_front();
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        match step {
            Some(Step::Reading(reading)) => {
                *last = Some(reading.clone());
                Ok(reading)
            }
            Some(Step::Failure(message)) => Err(anyhow!(message)),
            None => last
                .as_ref()
                .map(|r| Reading {
                    timestamp: Utc::now(),
                    ..r.clone()
                })
                .ok_or_else(|| anyhow!("scripted source has no readings")),
        }
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn sample(&self, _profile: &Profile) -> Result<Reading> {
        self.samples_taken.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_step()
    }
}
