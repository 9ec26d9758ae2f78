//! Snapshot Refresh Background Task
//!
//! Periodically runs an ingestion pass and, when it succeeds:
//!
//! 1. Publishes the new snapshot to the [`SnapshotStore`]
//! 2. Clears the derived result cache so queries read the new snapshot
//! 3. Writes the snapshot documents to the data directory
//!
//! A failed pass is logged and counted; the previously published snapshot
//! stays authoritative. A failed write only affects what the next restart
//! restores.
//!
//! # Configuration
//!
//! ```rust
//! use epitrack_service::jobs::RefreshConfig;
//! use std::time::Duration;
//!
//! let config = RefreshConfig {
//!     interval: Duration::from_secs(1800), // every 30 minutes
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use epitrack_core::EpiResult;
use epitrack_derive::CachedDerivation;
use epitrack_ingest::{IngestionPass, SourceFetcher};
use epitrack_storage::{SnapshotPersistence, SnapshotStore};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::DEFAULT_REFRESH_INTERVAL_SECS;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the refresh background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Time between ingestion passes (default: 30 minutes). The first pass
    /// runs as soon as the task starts.
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for refresh activity since startup.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Passes attempted
    pub passes: AtomicU64,

    /// Passes that failed and published nothing
    pub failures: AtomicU64,

    /// Published snapshots whose documents could not be written
    pub persist_failures: AtomicU64,

    /// Unix timestamp of the last successful publish, 0 if none yet
    pub last_success: AtomicU64,

    /// Store version of the last snapshot this task published
    pub last_version: AtomicU64,
}

impl RefreshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            last_success: self.last_success.load(Ordering::Relaxed),
            last_version: self.last_version.load(Ordering::Relaxed),
        }
    }
}

/// Refresh metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSnapshot {
    pub passes: u64,
    pub failures: u64,
    pub persist_failures: u64,
    pub last_success: u64,
    pub last_version: u64,
}

// ============================================================================
// SINGLE PASS
// ============================================================================

/// Run one ingestion pass and publish its result.
///
/// Returns the store version of the published snapshot. On error nothing is
/// published and the cache is left alone.
pub async fn refresh_once<F: SourceFetcher>(
    pass: &IngestionPass<F>,
    store: &SnapshotStore,
    persistence: &SnapshotPersistence,
    cache: &CachedDerivation,
    metrics: &RefreshMetrics,
) -> EpiResult<u64> {
    metrics.passes.fetch_add(1, Ordering::Relaxed);

    let snapshot = match pass.run().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            metrics.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                error = %e,
                kind = e.kind(),
                "Ingestion pass failed, keeping previous snapshot"
            );
            return Err(e);
        }
    };

    let snapshot = Arc::new(snapshot);
    let version = store.publish_shared(Arc::clone(&snapshot));
    let dropped = cache.invalidate();

    if let Err(e) = persistence.save(&snapshot) {
        metrics.persist_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            error = %e,
            dir = %persistence.dir().display(),
            "Snapshot published but not persisted"
        );
    }

    metrics
        .last_success
        .store(Utc::now().timestamp().max(0) as u64, Ordering::Relaxed);
    metrics.last_version.store(version, Ordering::Relaxed);

    tracing::info!(version, cache_entries_dropped = dropped, "Snapshot refreshed");
    Ok(version)
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that keeps the published snapshot current.
///
/// Runs until the shutdown signal is received or its sender is dropped.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(refresh_task(
///     pass, store, persistence, cache, RefreshConfig::default(), shutdown_rx,
/// ));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn refresh_task<F: SourceFetcher + 'static>(
    pass: Arc<IngestionPass<F>>,
    store: Arc<SnapshotStore>,
    persistence: SnapshotPersistence,
    cache: Arc<CachedDerivation>,
    config: RefreshConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<RefreshMetrics> {
    let metrics = Arc::new(RefreshMetrics::new());

    let mut refresh_interval = interval(config.interval);
    refresh_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        data_dir = %persistence.dir().display(),
        "Refresh task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Refresh task shutting down");
                    break;
                }
            }

            _ = refresh_interval.tick() => {
                // Failures are logged and counted inside.
                let _ = refresh_once(&pass, &store, &persistence, &cache, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        passes = snapshot.passes,
        failures = snapshot.failures,
        persist_failures = snapshot.persist_failures,
        last_version = snapshot.last_version,
        "Refresh task completed"
    );

    metrics
}
