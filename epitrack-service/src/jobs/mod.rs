//! Background jobs for the epitrack service
//!
//! - `refresh`: re-runs the ingestion pass and publishes the result
//!
//! # Usage
//!
//! Jobs are spawned during startup and stopped through a shared watch channel:
//!
//! ```ignore
//! use epitrack_service::jobs::{refresh_task, RefreshConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(refresh_task(
//!     pass, store, persistence, cache, RefreshConfig::default(), shutdown_rx,
//! ));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod refresh;

pub use refresh::{refresh_once, refresh_task, RefreshConfig, RefreshMetrics, RefreshSnapshot};
