//! The complete canonical state produced by one ingestion pass.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::{CountrySeriesSet, DataType, EpiError, EpiResult, LiveCountry, RegionSeriesSet};

/// Canonical collections for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    /// Country totals, sub-national rows merged in.
    pub countries: CountrySeriesSet,
    /// Province/state breakdown from the global source.
    pub regions: RegionSeriesSet,
    /// State breakdown from the US county source, when upstream publishes one.
    pub us_regions: Option<RegionSeriesSet>,
}

/// Read-only snapshot handed to the derivation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    datasets: BTreeMap<DataType, Dataset>,
    live: Vec<LiveCountry>,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        datasets: BTreeMap<DataType, Dataset>,
        live: Vec<LiveCountry>,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            datasets,
            live,
            built_at,
        }
    }

    /// Snapshot with no data, used before the first pass completes.
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), Vec::new(), DateTime::UNIX_EPOCH)
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty() && self.live.is_empty()
    }

    pub fn dataset(&self, data_type: DataType) -> EpiResult<&Dataset> {
        self.datasets
            .get(&data_type)
            .ok_or_else(|| EpiError::derivation(format!("{} data is not loaded yet", data_type)))
    }

    pub fn datasets(&self) -> impl Iterator<Item = (DataType, &Dataset)> {
        self.datasets.iter().map(|(k, v)| (*k, v))
    }

    pub fn live(&self) -> &[LiveCountry] {
        &self.live
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}
