//! One ingestion pass: fetch every source and build a complete snapshot.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use epitrack_core::{DataType, Dataset, EpiError, EpiResult, IngestError, Snapshot};

use crate::builder::{build_country_series, build_region_series};
use crate::fetch::{Source, SourceConfig, SourceFetcher};
use crate::live::{parse_live_feed, reconcile_live};
use crate::resolver::IdentityResolver;
use crate::schema::ColumnSchema;
use crate::table::RawTable;

/// Builds a fresh [`Snapshot`] from upstream. Nothing is published here; a
/// failed pass simply returns an error and the caller keeps its old snapshot.
pub struct IngestionPass<F: SourceFetcher> {
    fetcher: F,
    sources: SourceConfig,
    resolver: Arc<IdentityResolver>,
}

impl<F: SourceFetcher> IngestionPass<F> {
    pub fn new(fetcher: F, sources: SourceConfig, resolver: Arc<IdentityResolver>) -> Self {
        Self {
            fetcher,
            sources,
            resolver,
        }
    }

    pub fn sources(&self) -> &SourceConfig {
        &self.sources
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Run the pass. Any fetch, decode or build failure aborts it.
    pub async fn run(&self) -> EpiResult<Snapshot> {
        let started = std::time::Instant::now();
        let mut datasets = BTreeMap::new();

        for data_type in DataType::ALL {
            let dataset = self.build_dataset(data_type).await.map_err(|e| {
                tracing::error!(%data_type, error = %e, "Dataset build failed");
                EpiError::from(e)
            })?;
            tracing::info!(
                %data_type,
                countries = dataset.countries.len(),
                regions = dataset.regions.len(),
                us_states = ?dataset.us_regions.as_ref().map(|r| r.iter().map(|c| c.regions.len()).sum::<usize>()),
                "Dataset built"
            );
            datasets.insert(data_type, dataset);
        }

        let now = Utc::now();
        let feed = self.fetcher.fetch(&self.sources.live_feed).await?;
        let live = reconcile_live(
            parse_live_feed(&feed)?,
            &self.resolver,
            &datasets,
            now.timestamp(),
        );

        tracing::info!(
            live_rows = live.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion pass completed"
        );
        Ok(Snapshot::new(datasets, live, now))
    }

    async fn build_dataset(&self, data_type: DataType) -> Result<Dataset, IngestError> {
        let global = self.fetch_table(self.sources.global(data_type)).await?;
        let countries = build_country_series(&global, &ColumnSchema::GLOBAL, &self.resolver)?;
        let regions = build_region_series(&global, &ColumnSchema::GLOBAL, &self.resolver, false)?;

        let us_regions = match self.sources.us(data_type) {
            Some(source) => {
                let table = self.fetch_table(source).await?;
                Some(build_region_series(
                    &table,
                    &ColumnSchema::US,
                    &self.resolver,
                    true,
                )?)
            }
            None => None,
        };

        Ok(Dataset {
            countries,
            regions,
            us_regions,
        })
    }

    async fn fetch_table(&self, source: &Source) -> Result<RawTable, IngestError> {
        let body = self.fetcher.fetch(source).await?;
        RawTable::from_csv(source.name.clone(), &body)
    }
}
