//! Health Monitor - periodic health evaluation with predictive alerting
//!
//! Selects a profile from the environment, samples readings on every tick,
//! forwards verdicts and forecasts to the configured sinks and serves
//! health, readiness, metrics and status over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use monitor_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    predictor::{Predictor, PredictorConfig},
    sink::{AlertContext, LogSink, SinkDispatcher, StatusSink, WebhookSink},
    source::{MetricSource, ProviderProbe, SimulatedSource, SystemSource, DEFAULT_PROBE_TIMEOUT},
    Environment, ModelArtifact, Profile, Scheduler,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

mod api;
mod config;

use config::{LogFormat, MonitorConfig, SourceKind};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "health-monitor",
    version,
    about = "Periodic health monitor with predictive alerting"
)]
struct Cli {
    /// Environment profile: production, development or simulator
    /// (overrides MONITOR_ENVIRONMENT)
    #[arg(short, long)]
    environment: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = MonitorConfig::load()?;
    if cli.environment.is_some() {
        config.environment = cli.environment;
    }

    // The filter depends on the preset's debug flag; the full selection
    // below runs after tracing is up so its fallback warning is visible.
    let debug_mode = config
        .environment
        .as_deref()
        .and_then(|raw| raw.parse::<Environment>().ok())
        .map(|env| Profile::preset(env).debug_mode)
        .unwrap_or(false);
    init_tracing(config.log_format, debug_mode);

    let profile = Arc::new(
        Profile::select(config.environment.as_deref(), &config.profile_overrides())
            .context("Failed to select monitoring profile")?,
    );
    let logger = StructuredLogger::for_profile(&profile);
    logger.log_startup(MONITOR_VERSION, &profile);

    if let Some(ai) = &profile.ai {
        let path = ai.ml_model_path.display().to_string();
        match ModelArtifact::inspect(&ai.ml_model_path) {
            Ok(Some(artifact)) => {
                logger.log_model_artifact(&path, Some(&artifact.sha256), Some(artifact.size_bytes))
            }
            Ok(None) => logger.log_model_artifact(&path, None, None),
            Err(e) => warn!(path = %path, error = %e, "Failed to inspect model artifact"),
        }
    }

    let health_registry = HealthRegistry::new();
    for component in [
        components::METRIC_SOURCE,
        components::PREDICTOR,
        components::ALERT_SINK,
        components::SCHEDULER,
    ] {
        health_registry.register(component).await;
    }

    let status = StatusSink::new();
    let dispatcher = build_dispatcher(&config, &profile, &logger, &status)?;
    let source = build_source(&config, &profile)?;
    info!(source = %source.name(), sinks = dispatcher.len(), "Monitor configured");

    let predictor = Predictor::new(PredictorConfig {
        history_capacity: config.history_capacity,
        ..Default::default()
    });

    let mut scheduler = Scheduler::builder()
        .source(source)
        .predictor(predictor)
        .dispatcher(dispatcher)
        .health(health_registry.clone())
        .build()?;

    scheduler.start(profile.clone()).await?;
    health_registry.set_ready(true).await;

    let app_state = Arc::new(api::AppState {
        health_registry: health_registry.clone(),
        status,
        stats: scheduler.stats_handle(),
        models: scheduler.trained_models(),
        profile: profile.clone(),
    });
    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            "SIGINT received"
        }
        result = &mut api_handle => {
            match result {
                Ok(Ok(())) => "API server exited",
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server task panicked"
                }
            }
        }
    };

    logger.log_shutdown(reason);
    health_registry.set_ready(false).await;
    if let Err(e) = scheduler.stop().await {
        warn!(error = %e, "Scheduler did not stop cleanly");
    }
    api_handle.abort();

    Ok(())
}

fn init_tracing(format: LogFormat, debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init(),
    }
}

fn build_source(config: &MonitorConfig, profile: &Profile) -> Result<Arc<dyn MetricSource>> {
    let kind = config.metric_source.unwrap_or(match profile.environment {
        Environment::Simulator => SourceKind::Simulated,
        _ => SourceKind::System,
    });

    let source: Arc<dyn MetricSource> = match kind {
        SourceKind::Simulated => Arc::new(SimulatedSource::new()),
        SourceKind::System => {
            let mut source = SystemSource::new();
            if let Some(spec) = &config.provider_endpoints {
                let endpoints = ProviderProbe::parse_endpoints(spec)
                    .context("Invalid MONITOR_PROVIDER_ENDPOINTS")?;
                source = source.with_probe(ProviderProbe::new(endpoints, DEFAULT_PROBE_TIMEOUT)?);
            } else if profile.ai_enabled() {
                warn!("No provider endpoints configured; cloud providers will report degraded");
            }
            Arc::new(source)
        }
    };
    Ok(source)
}

fn build_dispatcher(
    config: &MonitorConfig,
    profile: &Profile,
    logger: &StructuredLogger,
    status: &StatusSink,
) -> Result<SinkDispatcher> {
    let mut dispatcher = SinkDispatcher::new(config.sink_timeout())
        .with_sink(Arc::new(LogSink::new(logger.clone())))
        .with_sink(Arc::new(status.clone()));

    if let Some(raw) = &config.webhook_url {
        let url = Url::parse(raw).context("Invalid MONITOR_WEBHOOK_URL")?;
        let context = AlertContext {
            environment: profile.environment.to_string(),
            instance: config.instance_name.clone(),
            generator_url: profile.ai.as_ref().and_then(|ai| ai.metrics_endpoint.clone()),
        };
        dispatcher.add_sink(Arc::new(WebhookSink::new(url, context, config.sink_timeout())?));
    }

    Ok(dispatcher)
}
