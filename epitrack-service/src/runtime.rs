//! Assembles the long-lived service components.

use std::sync::Arc;

use epitrack_core::EpiResult;
use epitrack_derive::{CachedDerivation, DerivationEngine};
use epitrack_ingest::{HttpFetcher, IdentityResolver, IngestionPass, IsoTable, SourceFetcher};
use epitrack_storage::{CsvPopulationSource, PopulationTable, SnapshotPersistence, SnapshotStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;
use crate::jobs::{refresh_task, RefreshConfig, RefreshMetrics};

/// Shared handles of one running service.
pub struct Service<F: SourceFetcher> {
    store: Arc<SnapshotStore>,
    derivation: Arc<CachedDerivation>,
    pass: Arc<IngestionPass<F>>,
    persistence: SnapshotPersistence,
    refresh: RefreshConfig,
}

impl Service<HttpFetcher> {
    /// Production wiring: reference documents from disk, sources over HTTP.
    pub fn from_config(config: &ServiceConfig) -> EpiResult<Self> {
        let iso = IsoTable::from_path(&config.iso_table_path)?;
        tracing::info!(
            path = %config.iso_table_path.display(),
            entries = iso.len(),
            "Loaded ISO reference table"
        );
        let resolver = Arc::new(IdentityResolver::new(iso));
        let population = PopulationTable::new(CsvPopulationSource::new(&config.population_path));
        let fetcher = HttpFetcher::new(config.sources.timeout)?;
        Ok(Self::assemble(config, fetcher, resolver, population))
    }
}

impl<F: SourceFetcher + 'static> Service<F> {
    /// Wire the components and restore the last persisted snapshot, if any.
    pub fn assemble(
        config: &ServiceConfig,
        fetcher: F,
        resolver: Arc<IdentityResolver>,
        population: PopulationTable,
    ) -> Self {
        let store = Arc::new(SnapshotStore::default());
        let persistence = SnapshotPersistence::new(&config.data_dir);

        match persistence.restore() {
            Ok(Some(snapshot)) => {
                let built_at = snapshot.built_at();
                store.publish(snapshot);
                tracing::info!(%built_at, "Restored persisted snapshot");
            }
            Ok(None) => {
                tracing::info!(
                    dir = %persistence.dir().display(),
                    "No persisted snapshot, waiting for first ingestion pass"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisted snapshot unusable, waiting for first ingestion pass");
            }
        }

        let engine = DerivationEngine::new(Arc::clone(&store), Arc::new(population))
            .with_world_population(config.world_population);
        let derivation = Arc::new(CachedDerivation::new(
            Arc::new(engine),
            config.cache_config(),
        ));
        let pass = Arc::new(IngestionPass::new(fetcher, config.sources.clone(), resolver));

        Self {
            store,
            derivation,
            pass,
            persistence,
            refresh: config.refresh_config(),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Query facade for the boundary embedding the service.
    pub fn derivation(&self) -> &Arc<CachedDerivation> {
        &self.derivation
    }

    pub fn persistence(&self) -> &SnapshotPersistence {
        &self.persistence
    }

    /// Spawn the refresh job; it stops when `shutdown_rx` flips to true.
    pub fn spawn_refresh(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<Arc<RefreshMetrics>> {
        tokio::spawn(refresh_task(
            Arc::clone(&self.pass),
            Arc::clone(&self.store),
            self.persistence.clone(),
            Arc::clone(&self.derivation),
            self.refresh.clone(),
            shutdown_rx,
        ))
    }
}
