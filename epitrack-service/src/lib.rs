//! epitrack refresh service
//!
//! Wires ingestion, storage and derivation together: restores the last
//! persisted snapshot, keeps it current on an interval and exposes the
//! cached derivation facade to whatever boundary embeds the service.

pub mod config;
pub mod jobs;
pub mod runtime;
pub mod telemetry;

pub use config::ServiceConfig;
pub use jobs::{refresh_once, refresh_task, RefreshConfig, RefreshMetrics, RefreshSnapshot};
pub use runtime::Service;
pub use telemetry::{init_tracing, LogFormat};
