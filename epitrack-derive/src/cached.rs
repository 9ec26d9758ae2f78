//! Memoized query facade over the [`DerivationEngine`].

use std::sync::Arc;

use epitrack_core::{DataType, EpiError, EpiResult, LiveCountry};
use epitrack_storage::{CacheConfig, CacheStats, ResultCache};

use crate::engine::DerivationEngine;
use crate::selection::Selection;
use crate::view::{Derived, ViewKind};

/// Cache key of one derived query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub view: ViewKind,
    pub data_type: DataType,
    pub selection: Selection,
}

/// Serves derived views through [`ResultCache`]s. Results stay valid until
/// the entry TTL runs out or [`CachedDerivation::invalidate`] is called.
pub struct CachedDerivation {
    engine: Arc<DerivationEngine>,
    views: ResultCache<QueryKey, Arc<Derived>>,
    live_document: ResultCache<(), Arc<Vec<LiveCountry>>>,
    live_rows: ResultCache<String, Arc<LiveCountry>>,
}

impl CachedDerivation {
    pub fn new(engine: Arc<DerivationEngine>, config: CacheConfig) -> Self {
        Self {
            engine,
            views: ResultCache::new(config.clone()),
            live_document: ResultCache::new(config.clone()),
            live_rows: ResultCache::new(config),
        }
    }

    pub fn engine(&self) -> &Arc<DerivationEngine> {
        &self.engine
    }

    pub fn derive(
        &self,
        view: ViewKind,
        data_type: DataType,
        selection: Selection,
    ) -> EpiResult<Arc<Derived>> {
        let key = QueryKey {
            view,
            data_type,
            selection,
        };
        let read = self.views.memoize(key.clone(), || {
            self.engine
                .derive(key.view, key.data_type, &key.selection)
                .map(Arc::new)
        })?;
        tracing::trace!(
            view = %key.view,
            data_type = %key.data_type,
            selection = %key.selection,
            hit = read.was_cache_hit(),
            "Derived view served"
        );
        Ok(read.into_value())
    }

    pub fn live_all(&self) -> EpiResult<Arc<Vec<LiveCountry>>> {
        self.live_document
            .memoize((), || Ok::<_, EpiError>(Arc::new(self.engine.live_all())))
            .map(|read| read.into_value())
    }

    pub fn live_country(&self, query: &str) -> EpiResult<Arc<LiveCountry>> {
        self.live_rows
            .memoize(query.to_string(), || {
                self.engine.live_country(query).map(Arc::new)
            })
            .map(|read| read.into_value())
    }

    /// Drop every cached result, e.g. after a new snapshot is published.
    pub fn invalidate(&self) -> u64 {
        let dropped = self.views.clear() + self.live_document.clear() + self.live_rows.clear();
        tracing::debug!(dropped, "Result cache invalidated");
        dropped
    }

    /// Combined statistics of every underlying cache.
    pub fn stats(&self) -> CacheStats {
        [
            self.views.stats(),
            self.live_document.stats(),
            self.live_rows.stats(),
        ]
        .into_iter()
        .fold(CacheStats::default(), |acc, s| CacheStats {
            hits: acc.hits + s.hits,
            misses: acc.misses + s.misses,
            entry_count: acc.entry_count + s.entry_count,
            evictions: acc.evictions + s.evictions,
        })
    }
}
