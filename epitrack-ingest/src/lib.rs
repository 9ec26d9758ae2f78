//! Epitrack Ingest - Upstream Sources to Canonical Series
//!
//! Decodes the upstream time-series CSVs, resolves every raw country label
//! to a canonical identity, builds merged cumulative histories and runs a
//! full ingestion pass that yields a fresh [`epitrack_core::Snapshot`].

pub mod builder;
pub mod fetch;
pub mod live;
pub mod pass;
pub mod resolver;
pub mod schema;
pub mod table;

pub use builder::{build_country_series, build_region_series};
pub use fetch::{HttpFetcher, Source, SourceConfig, SourceFetcher, StaticFetcher};
pub use live::{ascii_fold, parse_live_feed, reconcile_live};
pub use pass::IngestionPass;
pub use resolver::{alias, united_states, IdentityResolver, IsoTable};
pub use schema::ColumnSchema;
pub use table::RawTable;
