//! Epitrack Derive - Derived Views
//!
//! Computes history, proportion, daily and proportion-daily views of a
//! dataset for every entity, the world aggregate, one country, or the
//! subregions of one country. [`CachedDerivation`] memoizes the results.

pub mod cached;
pub mod engine;
pub mod selection;
pub mod transform;
pub mod view;

pub use cached::{CachedDerivation, QueryKey};
pub use engine::{DerivationEngine, DEFAULT_WORLD_POPULATION};
pub use selection::Selection;
pub use view::{Derived, SeriesView, ViewKind, ViewValues, UNSUPPORTED_PLACEHOLDER};
