//! Error taxonomy for the monitoring core
//!
//! None of these are fatal to the scheduler: each one is reported to the
//! caller of the failing operation and the tick loop carries on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// A reading was malformed; the tick that produced it is skipped
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// Forecast requested before anything was observed
    #[error("insufficient data: forecast needs at least one observation")]
    InsufficientData,

    /// An alert sink did not accept the event in time; the event is dropped
    #[error("alert sink `{sink}` did not accept event within {timeout_ms}ms")]
    SinkTimeout { sink: String, timeout_ms: u64 },

    /// An alert sink rejected the event
    #[error("alert sink `{sink}` failed: {reason}")]
    Sink { sink: String, reason: String },

    /// start() while running or stop() while stopped
    #[error("scheduler misuse: {0}")]
    SchedulerMisuse(String),

    /// The metric source could not produce a reading
    #[error("metric source failed: {0}")]
    Source(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// A background task panicked or was aborted
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl MonitorError {
    /// Short machine-friendly label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::InvalidReading(_) => "invalid_reading",
            MonitorError::InsufficientData => "insufficient_data",
            MonitorError::SinkTimeout { .. } => "sink_timeout",
            MonitorError::Sink { .. } => "sink_error",
            MonitorError::SchedulerMisuse(_) => "scheduler_misuse",
            MonitorError::Source(_) => "source_error",
            MonitorError::InvalidProfile(_) => "invalid_profile",
            MonitorError::TaskFailed(_) => "task_failed",
        }
    }
}
