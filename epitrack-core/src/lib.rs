//! Epitrack Core - Canonical Types
//!
//! Pure data structures shared by every other crate: date keys, identities,
//! cumulative series containers, live counters and the error taxonomy.
//! No I/O lives here.

pub mod date;
pub mod enums;
pub mod error;
pub mod identity;
pub mod live;
pub mod series;
pub mod snapshot;

pub use date::{DateKey, DateKeyParseError, DATE_KEY_FORMAT};
pub use enums::DataType;
pub use error::{
    ConfigError, DerivationError, EpiError, EpiResult, IngestError, PopulationError, QueryError,
    StorageError,
};
pub use identity::{eq_ignore_case, CanonicalIdentity};
pub use live::LiveCountry;
pub use series::{CountrySeriesSet, EntitySeries, RegionSeries, RegionSeriesSet, TimeSeries};
pub use snapshot::{Dataset, Snapshot};
