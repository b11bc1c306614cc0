//! Radar mosaic service.
//!
//! Serves the latest MRMS reflectivity mosaic as a PNG over HTTP, with an
//! optional background refresh loop and on-disk copy of the last frame.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use radar_api::config::{Args, RadarConfig};
use radar_api::scheduler::RefreshScheduler;
use radar_api::{metrics, server, AppState, RadarCache, RefreshPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = RadarConfig::from_args(&args).context("Invalid configuration")?;
    let addr = config.listen_addr()?;

    let prometheus_handle =
        metrics::install_recorder().context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    info!(
        base_url = %config.source.base_url,
        selector = ?config.source.selector,
        staleness_policy = config.cache.staleness_policy.as_str(),
        max_age_secs = config.cache.max_age_secs,
        "Starting radar mosaic service"
    );

    let pipeline = RefreshPipeline::from_config(&config).context("Failed to build refresh pipeline")?;

    let persisted = match pipeline.store() {
        Some(store) => store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable persisted frame");
            None
        }),
        None => None,
    };

    let cache = RadarCache::new(
        Arc::new(pipeline),
        config.cache.staleness_policy,
        config.cache.max_age(),
    );
    if let Some(frame) = persisted {
        cache.seed(frame).await;
    }

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    let scheduler = if config.schedule.poll_interval_secs > 0 {
        let scheduler = RefreshScheduler::new(
            cache.clone(),
            Duration::from_secs(config.schedule.poll_interval_secs),
        );
        let shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move { scheduler.run_forever(shutdown).await }))
    } else {
        None
    };

    let state = Arc::new(AppState::new(cache).with_prometheus(prometheus_handle));
    let mut server_shutdown = shutdown_tx.subscribe();
    server::run_server(state, addr, async move {
        server_shutdown.recv().await.ok();
    })
    .await
    .with_context(|| format!("Server on {} failed", addr))?;

    if let Some(handle) = scheduler {
        handle.await.ok();
    }

    info!("Radar mosaic service stopped");
    Ok(())
}
