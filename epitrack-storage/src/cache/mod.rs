//! In-process memoization of derived results.
//!
//! Derived views are pure functions of the published snapshot, so a result
//! computed once can be served again until either its TTL elapses or a new
//! snapshot is published (at which point the refresh job clears the cache).
//!
//! Reads return [`CacheRead<T>`], which carries when the value was computed
//! and whether it came from the cache.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResultCache::new(CacheConfig::new().with_ttl(Duration::from_secs(900)));
//! let read = cache.memoize(key, || engine.compute(&selection))?;
//! if !read.was_cache_hit() {
//!     tracing::debug!("Computed fresh result");
//! }
//! ```

pub mod config;
pub mod read;
pub mod result_cache;
pub mod stats;

pub use config::CacheConfig;
pub use read::CacheRead;
pub use result_cache::ResultCache;
pub use stats::CacheStats;
