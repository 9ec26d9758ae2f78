//! epitrack service entry point
//!
//! Loads configuration, restores the last persisted snapshot and keeps it
//! refreshed until interrupted.

use epitrack_core::EpiResult;
use epitrack_service::{init_tracing, Service, ServiceConfig};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> EpiResult<()> {
    let config = ServiceConfig::from_env();
    init_tracing(config.log_format)?;
    config.validate()?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        refresh_interval_secs = config.refresh_interval.as_secs(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "Starting epitrack service"
    );

    let service = Service::from_config(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = service.spawn_refresh(shutdown_rx);

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    match refresh.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                passes = snapshot.passes,
                failures = snapshot.failures,
                "Refresh job stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Refresh job panicked"),
    }

    let stats = service.derivation().stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "Result cache totals"
    );
    Ok(())
}
