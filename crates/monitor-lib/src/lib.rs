//! Monitoring library for periodic health evaluation
//!
//! This crate provides the core functionality for:
//! - Sampling resource readings from the host or a simulator
//! - Threshold-based health verdicts
//! - Rolling-history forecasting and anomaly detection
//! - Scheduled evaluation and retraining ticks
//! - Alert delivery and observability

pub mod error;
pub mod evaluator;
pub mod health;
pub mod model;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod profile;
pub mod scheduler;
pub mod sink;
pub mod source;

pub use error::MonitorError;
pub use evaluator::evaluate;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use model::ModelArtifact;
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use profile::{AiSettings, Environment, Profile, ProfileOverrides};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerStats, StatsHandle};
