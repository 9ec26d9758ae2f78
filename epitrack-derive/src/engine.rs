//! Derivation Engine: on-demand views over the published snapshot.
//!
//! Each call loads the current snapshot once and works on that `Arc` for its
//! whole duration, so a publish in the middle of a computation is never
//! observed halfway.

use std::collections::BTreeMap;
use std::sync::Arc;

use epitrack_core::{
    CanonicalIdentity, DataType, Dataset, EpiError, EpiResult, LiveCountry, PopulationError,
    QueryError, RegionSeries, TimeSeries,
};
use epitrack_ingest::united_states;
use epitrack_storage::{PopulationTable, SnapshotStore};

use crate::selection::Selection;
use crate::transform;
use crate::view::{Derived, SeriesView, ViewKind, ViewValues};

/// World population used as the divisor of world proportions.
pub const DEFAULT_WORLD_POPULATION: f64 = 7_794_798_739.0;

/// Computes derived views from the snapshot store and population table.
pub struct DerivationEngine {
    store: Arc<SnapshotStore>,
    population: Arc<PopulationTable>,
    world_population: f64,
}

impl DerivationEngine {
    pub fn new(store: Arc<SnapshotStore>, population: Arc<PopulationTable>) -> Self {
        Self {
            store,
            population,
            world_population: DEFAULT_WORLD_POPULATION,
        }
    }

    pub fn with_world_population(mut self, world_population: f64) -> Self {
        self.world_population = world_population;
        self
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn population(&self) -> &Arc<PopulationTable> {
        &self.population
    }

    pub fn world_population(&self) -> f64 {
        self.world_population
    }

    /// Compute `view` of `data_type` for `selection`.
    pub fn derive(
        &self,
        view: ViewKind,
        data_type: DataType,
        selection: &Selection,
    ) -> EpiResult<Derived> {
        let snapshot = self.store.load();
        let dataset = snapshot.dataset(data_type)?;
        tracing::trace!(%view, %data_type, %selection, "Deriving view");

        match selection {
            Selection::All => self.all(view, dataset),
            Selection::World => self.world(view, dataset),
            Selection::Country(query) => self.country(view, dataset, query),
            Selection::Region { country, region } => {
                let country = region_country(dataset, data_type, country)?;
                region_view(view, country, region)
            }
            Selection::Regions(country) => {
                let country = region_country(dataset, data_type, country)?;
                regions_view(view, country)
            }
        }
    }

    pub fn history(&self, data_type: DataType, selection: &Selection) -> EpiResult<Derived> {
        self.derive(ViewKind::History, data_type, selection)
    }

    pub fn proportion(&self, data_type: DataType, selection: &Selection) -> EpiResult<Derived> {
        self.derive(ViewKind::Proportion, data_type, selection)
    }

    pub fn daily(&self, data_type: DataType, selection: &Selection) -> EpiResult<Derived> {
        self.derive(ViewKind::Daily, data_type, selection)
    }

    pub fn proportion_daily(
        &self,
        data_type: DataType,
        selection: &Selection,
    ) -> EpiResult<Derived> {
        self.derive(ViewKind::ProportionDaily, data_type, selection)
    }

    /// Every live row, in feed order.
    pub fn live_all(&self) -> Vec<LiveCountry> {
        self.store.load().live().to_vec()
    }

    /// The live row matching `query` by country name, iso2 or iso3.
    pub fn live_country(&self, query: &str) -> EpiResult<LiveCountry> {
        self.store
            .load()
            .live()
            .iter()
            .find(|row| row.identity().matches(query))
            .cloned()
            .ok_or_else(|| country_not_found(query))
    }

    fn all(&self, view: ViewKind, dataset: &Dataset) -> EpiResult<Derived> {
        let mut out = BTreeMap::new();
        for entity in dataset.countries.iter() {
            let series = if view.needs_population() {
                match self.population_if_known(&entity.identity)? {
                    Some(population) => SeriesView::with_codes(
                        view,
                        values(view, &entity.history, population)?,
                        &entity.identity,
                    ),
                    None => SeriesView::bare(view, ViewValues::unsupported()),
                }
            } else {
                SeriesView::with_codes(view, values(view, &entity.history, 0.0)?, &entity.identity)
            };
            out.insert(entity.identity.name.clone(), series);
        }
        Ok(Derived::All(out))
    }

    fn world(&self, view: ViewKind, dataset: &Dataset) -> EpiResult<Derived> {
        let total = dataset.countries.world_total();
        Ok(Derived::World(SeriesView::bare(
            view,
            values(view, &total, self.world_population)?,
        )))
    }

    fn country(&self, view: ViewKind, dataset: &Dataset, query: &str) -> EpiResult<Derived> {
        let entity = dataset
            .countries
            .find(query)
            .ok_or_else(|| country_not_found(query))?;
        let population = if view.needs_population() {
            self.population.population_of(&entity.identity.iso3)?
        } else {
            0.0
        };
        Ok(Derived::Country(SeriesView::named(
            view,
            values(view, &entity.history, population)?,
            &entity.identity,
        )))
    }

    /// Population for the all-entities views. Unresolved codes and codes the
    /// table does not know yield `None` so the entity gets the placeholder.
    fn population_if_known(&self, identity: &CanonicalIdentity) -> EpiResult<Option<f64>> {
        if !identity.is_resolved() {
            return Ok(None);
        }
        match self.population.population_of(&identity.iso3) {
            Ok(population) => Ok(Some(population)),
            Err(EpiError::Population(PopulationError::NotFound { iso3 })) => {
                tracing::warn!(country = %identity.name, %iso3, "No population for entity");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Apply `view` to one cumulative series. `population` is ignored by the
/// views that do not divide.
fn values(view: ViewKind, history: &TimeSeries, population: f64) -> EpiResult<ViewValues> {
    Ok(match view {
        ViewKind::History => ViewValues::Counts(history.as_map().clone()),
        ViewKind::Daily => ViewValues::Deltas(transform::daily(history)),
        ViewKind::Proportion => ViewValues::Formatted(transform::proportion(history, population)?),
        ViewKind::ProportionDaily => {
            ViewValues::Formatted(transform::proportion_daily(history, population)?)
        }
    })
}

/// Matched country in the region collection the query belongs to. Any alias
/// of the United States reads the US state collection.
fn region_country<'a>(
    dataset: &'a Dataset,
    data_type: DataType,
    query: &str,
) -> EpiResult<&'a RegionSeries> {
    let collection = if united_states().matches(query) {
        dataset.us_regions.as_ref().ok_or_else(|| {
            EpiError::derivation(format!(
                "no United States subregion data is published for {}",
                data_type
            ))
        })?
    } else {
        &dataset.regions
    };
    collection
        .find(query)
        .ok_or_else(|| country_not_found(query))
}

fn region_view(view: ViewKind, country: &RegionSeries, label: &str) -> EpiResult<Derived> {
    reject_population_view(view)?;
    let (_, history) = country.region(label).ok_or_else(|| {
        EpiError::from(QueryError::RegionNotFound {
            country: country.identity.name.clone(),
            region: label.to_string(),
        })
    })?;
    Ok(Derived::Region(SeriesView::bare(
        view,
        values(view, history, 0.0)?,
    )))
}

fn regions_view(view: ViewKind, country: &RegionSeries) -> EpiResult<Derived> {
    reject_population_view(view)?;
    let mut out = BTreeMap::new();
    for (label, history) in &country.regions {
        out.insert(label.clone(), SeriesView::bare(view, values(view, history, 0.0)?));
    }
    Ok(Derived::Regions(out))
}

fn reject_population_view(view: ViewKind) -> EpiResult<()> {
    if view.needs_population() {
        return Err(EpiError::derivation(format!(
            "{} is not available for subregions",
            view
        )));
    }
    Ok(())
}

fn country_not_found(query: &str) -> EpiError {
    QueryError::CountryNotFound {
        query: query.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use epitrack_core::{DateKey, EntitySeries, RegionSeriesSet, Snapshot};
    use epitrack_storage::StaticPopulationSource;
    use serde_json::json;

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn series(values: &[u64]) -> TimeSeries {
        let mut date = key("1/22/20");
        let mut ts = TimeSeries::new();
        for v in values {
            ts.insert(date, *v);
            date = date.succ().unwrap();
        }
        ts
    }

    fn dataset(with_us: bool) -> Dataset {
        let mut dataset = Dataset::default();
        for (identity, values) in [
            (CanonicalIdentity::new("France", "FR", "FRA"), vec![1, 5, 5]),
            (CanonicalIdentity::new("Taiwan", "TW", "TWN"), vec![2, 2, 3]),
            (CanonicalIdentity::unresolved("Diamond Princess"), vec![10, 10, 10]),
        ] {
            dataset.countries.insert(EntitySeries {
                identity,
                history: series(&values),
            });
        }
        dataset.regions.insert(RegionSeries {
            identity: CanonicalIdentity::new("Canada", "CA", "CAN"),
            regions: [
                ("Ontario".to_string(), series(&[1, 3, 6])),
                ("Quebec".to_string(), series(&[0, 1, 1])),
            ]
            .into_iter()
            .collect(),
        });
        if with_us {
            let mut us = RegionSeriesSet::new();
            us.insert(RegionSeries {
                identity: CanonicalIdentity::new("United States", "US", "USA"),
                regions: [("Texas".to_string(), series(&[1, 4, 9]))].into_iter().collect(),
            });
            dataset.us_regions = Some(us);
        }
        dataset
    }

    fn engine() -> DerivationEngine {
        let mut datasets = BTreeMap::new();
        datasets.insert(DataType::Confirmed, dataset(true));
        datasets.insert(DataType::Recovered, dataset(false));
        let live = vec![serde_json::from_value::<LiveCountry>(json!({
            "country": "France", "totalCases": 5, "iso2": "FR", "iso3": "FRA"
        }))
        .unwrap()];
        let store = Arc::new(SnapshotStore::new(Snapshot::new(datasets, live, Utc::now())));
        let population = Arc::new(PopulationTable::new(StaticPopulationSource::new([
            ("FRA", 1000.0),
        ])));
        DerivationEngine::new(store, population).with_world_population(10_000.0)
    }

    fn json(derived: Derived) -> serde_json::Value {
        serde_json::to_value(derived).unwrap()
    }

    #[test]
    fn test_country_daily_example() {
        let out = engine()
            .daily(DataType::Confirmed, &Selection::Country("fra".to_string()))
            .unwrap();
        assert_eq!(
            json(out),
            json!({
                "daily": {"01/22/20": 1, "01/23/20": 4, "01/24/20": 0},
                "iso2": "FR", "iso3": "FRA", "name": "France"
            })
        );
    }

    #[test]
    fn test_world_history_and_proportion() {
        let engine = engine();
        let history = engine.history(DataType::Confirmed, &Selection::World).unwrap();
        assert_eq!(
            json(history),
            json!({"history": {"01/22/20": 13, "01/23/20": 17, "01/24/20": 18}})
        );
        let proportion = engine.proportion(DataType::Confirmed, &Selection::World).unwrap();
        assert_eq!(
            json(proportion),
            json!({"proportion": {"01/22/20": "0.13000", "01/23/20": "0.17000", "01/24/20": "0.18000"}})
        );
    }

    #[test]
    fn test_all_proportion_uses_placeholder_for_unknown_entities() {
        let out = json(
            engine()
                .proportion(DataType::Confirmed, &Selection::All)
                .unwrap(),
        );
        assert_eq!(out["France"]["proportion"]["01/23/20"], json!("0.50000"));
        assert_eq!(out["France"]["iso3"], json!("FRA"));
        assert_eq!(
            out["Diamond Princess"],
            json!({"proportion": crate::view::UNSUPPORTED_PLACEHOLDER})
        );
        // Resolved code absent from the population table.
        assert_eq!(
            out["Taiwan"],
            json!({"proportion": crate::view::UNSUPPORTED_PLACEHOLDER})
        );
    }

    #[test]
    fn test_country_proportion_without_population_fails() {
        let err = engine()
            .proportion_daily(DataType::Confirmed, &Selection::Country("TW".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "PopulationNotFound");
        let err = engine()
            .proportion(
                DataType::Confirmed,
                &Selection::Country("diamond princess".to_string()),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "PopulationNotFound");
    }

    #[test]
    fn test_unknown_country_is_not_found() {
        let engine = engine();
        for view in ViewKind::ALL {
            let err = engine
                .derive(view, DataType::Confirmed, &Selection::Country("Atlantis".to_string()))
                .unwrap_err();
            assert_eq!(err.kind(), "CountryNotFound");
            assert!(err.is_not_found());
        }
        assert_eq!(engine.live_country("Atlantis").unwrap_err().kind(), "CountryNotFound");
    }

    #[test]
    fn test_region_lookup() {
        let engine = engine();
        let ontario = engine
            .history(
                DataType::Confirmed,
                &Selection::Region {
                    country: "CA".to_string(),
                    region: "ontario".to_string(),
                },
            )
            .unwrap();
        assert_eq!(
            json(ontario),
            json!({"history": {"01/22/20": 1, "01/23/20": 3, "01/24/20": 6}})
        );

        let err = engine
            .history(
                DataType::Confirmed,
                &Selection::Region {
                    country: "canada".to_string(),
                    region: "Yukon".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "RegionNotFound");
    }

    #[test]
    fn test_us_aliases_read_us_collection() {
        let engine = engine();
        for alias in ["us", "USA", "united states"] {
            let out = engine
                .daily(
                    DataType::Confirmed,
                    &Selection::Region {
                        country: alias.to_string(),
                        region: "texas".to_string(),
                    },
                )
                .unwrap();
            assert_eq!(
                json(out),
                json!({"daily": {"01/22/20": 1, "01/23/20": 3, "01/24/20": 5}})
            );
        }
        let err = engine
            .history(DataType::Recovered, &Selection::Regions("us".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "DerivationFailed");
    }

    #[test]
    fn test_all_regions_and_population_views_over_regions() {
        let engine = engine();
        let out = json(
            engine
                .history(DataType::Confirmed, &Selection::Regions("Canada".to_string()))
                .unwrap(),
        );
        assert_eq!(out["Quebec"], json!({"history": {"01/22/20": 0, "01/23/20": 1, "01/24/20": 1}}));

        let err = engine
            .proportion(DataType::Confirmed, &Selection::Regions("Canada".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "DerivationFailed");
    }

    #[test]
    fn test_missing_dataset_is_derivation_failure() {
        let err = engine()
            .history(DataType::Deaths, &Selection::All)
            .unwrap_err();
        assert_eq!(err.kind(), "DerivationFailed");
    }

    #[test]
    fn test_live_views() {
        let engine = engine();
        assert_eq!(engine.live_all().len(), 1);
        assert_eq!(engine.live_country("fr").unwrap().total_cases, Some(5));
    }
}
