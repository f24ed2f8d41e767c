//! Cardinality Guard
//!
//! Runs statsd-style backends behind a cardinality limiter:
//! - Per metric name HyperLogLog estimates of distinct tag-sets
//! - Whole-name drops once a name reaches its limit
//! - Periodic full reset of all estimates
//! - Synthetic load to exercise the limiter end to end

mod load;
mod log_backend;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use cardinality_limiter::{wrap_backend, RateLimitConfig};
use guard_core::error::ConfigErrorCode;
use guard_core::{Error, Event, SharedBackend};
use telemetry::{init_tracing_from_env, metrics};

use crate::load::{LoadConfig, LoadGenerator};
use crate::log_backend::LogBackend;

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Backends to install, by name
    #[serde(default = "default_backends")]
    backends: Vec<String>,
    #[serde(default = "default_flush_interval_ms")]
    flush_interval_ms: u64,
    #[serde(default = "default_stats_interval_secs")]
    stats_interval_secs: u64,

    #[serde(default)]
    rate_limit: RateLimitConfig,

    #[serde(default)]
    load: LoadConfig,
}

fn default_backends() -> Vec<String> {
    vec!["stdout".to_string()]
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_stats_interval_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            flush_interval_ms: default_flush_interval_ms(),
            stats_interval_secs: default_stats_interval_secs(),
            rate_limit: RateLimitConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Cardinality Guard v{}", env!("CARGO_PKG_VERSION"));

    // Any configuration error is fatal
    let config = load_config()?;
    let backends = build_backends(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    // Background roles of the installed backends
    for backend in &backends {
        if backend.as_runner().is_some() {
            let backend = backend.clone();
            let shutdown = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                if let Some(runner) = backend.as_runner() {
                    runner.run(shutdown).await;
                }
            }));
        }
        if backend.as_metrics_runner().is_some() {
            let backend = backend.clone();
            let shutdown = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                if let Some(runner) = backend.as_metrics_runner() {
                    runner.run_metrics(shutdown).await;
                }
            }));
        }
    }

    announce_start(&backends).await;

    if config.load.enabled {
        handles.push(tokio::spawn(run_flush_loop(
            backends.clone(),
            LoadGenerator::new(config.load.clone()),
            Duration::from_millis(config.flush_interval_ms),
            shutdown_rx.clone(),
        )));
        info!(
            metric_count = config.load.metric_count,
            unique_id_metrics = config.load.unique_id_metrics,
            "Started synthetic load"
        );
    }

    handles.push(tokio::spawn(run_stats_reporter(
        Duration::from_secs(config.stats_interval_secs.max(1)),
        shutdown_rx,
    )));

    shutdown_signal().await;
    info!("Shutting down...");

    shutdown_tx.send(true).ok();
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Background task failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    load_config_from("config/default")
}

fn load_config_from(file: &str) -> Result<Config> {
    let settings = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name(file)
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("GUARD")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    // Read the override table on its own so a bad entry carries its own code
    match settings.get::<HashMap<String, u64>>("rate_limit.limit_by_metric_name") {
        Ok(_) | Err(config::ConfigError::NotFound(_)) => {}
        Err(e) => {
            return Err(Error::config(
                ConfigErrorCode::MalformedOverrides,
                format!("invalid rate_limit.limit_by_metric_name: {}", e),
            )
            .into());
        }
    }

    let mut config: Config = settings
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Same knob as the standalone load sender
    if let Ok(count) = std::env::var("METRIC_COUNT") {
        config.load.metric_count = count
            .parse()
            .with_context(|| format!("Invalid METRIC_COUNT: {}", count))?;
    }

    config
        .rate_limit
        .ensure_valid()
        .context("Invalid rate limit configuration")?;

    Ok(config)
}

/// Creates the configured backends, each wrapped by the limiter if enabled.
fn build_backends(config: &Config) -> Result<Vec<SharedBackend>> {
    let report_interval = Duration::from_secs(config.stats_interval_secs.max(1));
    let mut backends = Vec::with_capacity(config.backends.len());

    for name in &config.backends {
        info!(backend = %name, "Initializing backend");

        let backend: SharedBackend = match name.as_str() {
            "stdout" | "log" => Arc::new(LogBackend::new(name.clone(), report_interval)),
            other => bail!("Unknown backend: {}", other),
        };

        let backend = wrap_backend(backend, &config.rate_limit)
            .with_context(|| format!("Failed to wrap backend {}", name))?;
        backends.push(backend);
    }

    if backends.is_empty() {
        warn!("No backends configured, metrics will be discarded");
    }

    Ok(backends)
}

/// Sends a startup event through every backend.
async fn announce_start(backends: &[SharedBackend]) {
    let event = Event::new(
        "cardinality-guard started",
        format!("version {}", env!("CARGO_PKG_VERSION")),
    );

    for backend in backends {
        if let Err(e) = backend.send_event(&event).await {
            error!(backend = backend.name(), "Failed to send startup event: {}", e);
        }
    }
}

/// Flushes a synthetic batch to every backend on each tick.
async fn run_flush_loop(
    backends: Vec<SharedBackend>,
    generator: LoadGenerator,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = guard_core::wait_for_shutdown(&mut shutdown) => break,
        }

        let batch = generator.next_batch();
        for backend in &backends {
            let name = backend.name().to_string();
            backend.send_metrics_async(
                batch.clone(),
                Box::new(move |errors| {
                    for e in errors {
                        error!(backend = %name, "Failed to send metrics: {}", e);
                    }
                }),
            );
        }
    }
}

/// Logs limiter telemetry periodically.
async fn run_stats_reporter(interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = guard_core::wait_for_shutdown(&mut shutdown) => break,
        }

        match metrics().snapshot().to_json() {
            Ok(snapshot) => info!(snapshot = %snapshot, "Limiter stats"),
            Err(e) => error!("Failed to serialize limiter stats: {}", e),
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
