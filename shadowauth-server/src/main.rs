//! `shadowauth` service binary.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use shadowauth_core::{cache::MemorySessionCache, health::HealthMonitor, SessionCoordinator};
use shadowauth_server::{cli::Args, serve, spawn_fallback_sweeper, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ANALYTICS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.to_config();
    info!(
        network = %config.network,
        runtime = if config.is_mock_runtime() { "mock" } else { "live" },
        contract = %config.contract_address(),
        contract_writes_enabled = config.contract_writes_enabled,
        "starting shadowauth"
    );

    let cache = Arc::new(MemorySessionCache::new());
    let (coordinator, analytics_worker) =
        SessionCoordinator::from_config(&config, cache).wrap_err("invalid configuration")?;
    let coordinator = Arc::new(coordinator);

    let monitor = HealthMonitor::spawn(coordinator.runtime(), config.health_interval);
    let sweeper = spawn_fallback_sweeper(coordinator.clone(), config.sweep_interval);
    let state = AppState::new(coordinator, monitor.subscribe());

    let listener = TcpListener::bind(args.listen)
        .await
        .wrap_err_with(|| format!("failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "listening");
    serve(listener, state, shutdown_signal()).await?;

    sweeper.abort();
    let _ = sweeper.await;
    drop(monitor);
    if tokio::time::timeout(ANALYTICS_DRAIN_TIMEOUT, analytics_worker)
        .await
        .is_err()
    {
        warn!("analytics queue not drained before shutdown");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
