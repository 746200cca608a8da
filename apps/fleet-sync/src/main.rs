//! Fleet Sync Binary
//!
//! Connects to a fleet manager, keeps the fleet and system stores current
//! and logs every change until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin fleet-sync
//! ```
//!
//! # Environment Variables
//!
//! - `FLEET_ORIGIN`: Fleet manager origin (default: <http://localhost:8080>)
//! - `FLEET_STREAM_URL`: WebSocket URL override (default: origin + `/ws`)
//! - `FLEET_API_URL`: REST base override (default: origin + `/api`)
//! - `FLEET_RECONNECT_DELAY_INITIAL_MS`: First reconnect delay (default: 1000)
//! - `FLEET_RECONNECT_DELAY_MAX_MS`: Reconnect delay ceiling (default: 30000)
//! - `FLEET_RECONNECT_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `FLEET_RECONNECT_JITTER`: Jitter fraction (default: 0)
//! - `FLEET_MAX_RECONNECT_ATTEMPTS`: Reconnect budget, 0 = unlimited (default: 10)
//! - `FLEET_HTTP_TIMEOUT_SECS`: REST request timeout (default: 30)
//! - `FLEET_METRICS_PORT`: Prometheus port, 0 = disabled (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fleet_sync::infrastructure::telemetry;
use fleet_sync::{FleetStore, SyncConfig, SyncContainer, SystemStore, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for watcher tasks to finish after shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("rustls crypto provider already installed"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Fleet Sync");

    let config = SyncConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.observability.metrics_port > 0 {
        init_metrics(config.observability.metrics_port)
            .context("failed to start metrics exporter")?;
    }

    let container = SyncContainer::new(config).context("failed to build fleet gateway")?;
    let shutdown_token = CancellationToken::new();

    let fleet_watcher = tokio::spawn(watch_fleet(container.fleet(), shutdown_token.clone()));
    let system_watcher = tokio::spawn(watch_system(container.system(), shutdown_token.clone()));

    match container.gateway().health().await {
        Ok(health) => tracing::info!(status = %health.status, "Fleet manager reachable"),
        Err(e) => tracing::warn!(error = %e, "Fleet manager health check failed"),
    }

    if let Err(e) = container.start_and_load().await {
        tracing::error!(error = %e, "Initial fleet load failed");
    }

    tracing::info!("Fleet sync ready");

    await_shutdown(shutdown_token).await;

    container.shutdown();
    let watchers = async {
        let _ = tokio::join!(fleet_watcher, system_watcher);
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, watchers).await.is_err() {
        tracing::warn!("Watchers did not stop in time");
    }

    tracing::info!("Fleet sync stopped");
    Ok(())
}

/// Log a summary every time the fleet snapshot changes.
async fn watch_fleet(fleet: Arc<FleetStore>, shutdown: CancellationToken) {
    let mut rx = fleet.subscribe();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if state.loading {
                    continue;
                }
                tracing::debug!(
                    containers = state.containers.len(),
                    stacks = state.stacks.len(),
                    volumes = state.volumes.len(),
                    networks = state.networks.len(),
                    images = state.images.len(),
                    metrics = state.container_stats.len(),
                    error = state.error.as_deref().unwrap_or(""),
                    "Fleet state updated"
                );
            }
        }
    }
}

/// Log connection changes and host metrics.
async fn watch_system(system: Arc<SystemStore>, shutdown: CancellationToken) {
    let mut connected = system.connected();
    let mut state = system.subscribe();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            changed = connected.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *connected.borrow_and_update();
                if now {
                    tracing::info!("Stream connected");
                } else {
                    tracing::warn!(state = system.connection_state().as_str(), "Stream disconnected");
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                match snapshot.error {
                    Some(e) => tracing::warn!(error = %e, "Host metrics rejected"),
                    None => tracing::trace!(
                        hostname = %snapshot.stats.hostname,
                        cpu_usage = snapshot.stats.cpu_usage,
                        memory_percent = snapshot.stats.memory_percent,
                        "Host metrics"
                    ),
                }
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &SyncConfig) {
    tracing::info!(
        origin = %config.origin,
        metrics_port = config.observability.metrics_port,
        max_reconnect_attempts = config.stream.max_reconnect_attempts,
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.stream.url,
        api_base = %config.rest.base_url,
        health_url = %config.rest.health_url,
        "Fleet endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
