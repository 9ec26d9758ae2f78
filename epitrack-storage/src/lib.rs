//! Epitrack Storage - Snapshot State and Caches
//!
//! Everything the query path reads lives here: the atomically published
//! snapshot, its on-disk JSON form, the population lookup and the memoizing
//! result cache.

pub mod cache;
pub mod persist;
pub mod population;
pub mod store;

pub use cache::{CacheConfig, CacheRead, CacheStats, ResultCache};
pub use persist::SnapshotPersistence;
pub use population::{
    CsvPopulationSource, PopulationSource, PopulationTable, StaticPopulationSource,
};
pub use store::SnapshotStore;
