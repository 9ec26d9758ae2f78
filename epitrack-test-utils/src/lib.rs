//! Epitrack Test Utilities
//!
//! Centralized test infrastructure for the epitrack workspace:
//! - Fixture documents (time-series CSVs, ISO table, population CSV, live feed)
//! - A scriptable in-memory fetcher for ingestion and refresh tests
//! - Proptest generators for series and identities
//! - Assertions over the error taxonomy

pub use epitrack_core::{
    CanonicalIdentity, CountrySeriesSet, DataType, Dataset, DateKey, EntitySeries, EpiError,
    EpiResult, LiveCountry, RegionSeries, RegionSeriesSet, Snapshot, TimeSeries,
};
pub use epitrack_ingest::{IdentityResolver, IsoTable, Source, SourceConfig, SourceFetcher};
pub use epitrack_storage::{PopulationTable, SnapshotStore, StaticPopulationSource};

use async_trait::async_trait;
use epitrack_core::IngestError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// SCRIPTED FETCHER
// ============================================================================

#[derive(Debug, Default)]
struct ScriptState {
    documents: HashMap<String, Vec<u8>>,
    failing: bool,
    fetches: u64,
}

/// In-memory fetcher whose documents and failure mode can be changed while
/// a pass or refresh job holds a clone of it.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher serving every fixture document under its default source name.
    pub fn with_fixture_documents() -> Self {
        let fetcher = Self::new();
        for (name, body) in fixtures::documents() {
            fetcher.set_document(name, body);
        }
        fetcher
    }

    pub fn set_document(&self, source_name: impl Into<String>, body: impl Into<Vec<u8>>) {
        if let Ok(mut state) = self.state.lock() {
            state.documents.insert(source_name.into(), body.into());
        }
    }

    /// Make every subsequent fetch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.failing = failing;
        }
    }

    pub fn fetch_count(&self) -> u64 {
        self.state.lock().map(|s| s.fetches).unwrap_or(0)
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>, IngestError> {
        let fail = |reason: &str| IngestError::Fetch {
            source_name: source.name.clone(),
            reason: reason.to_string(),
        };
        let mut state = self.state.lock().map_err(|_| fail("fetcher state poisoned"))?;
        state.fetches += 1;
        if state.failing {
            return Err(fail("scripted failure"));
        }
        state
            .documents
            .get(&source.name)
            .cloned()
            .ok_or_else(|| fail("no such document"))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Small but realistic upstream documents.
    //!
    //! Confirmed country totals over `01/22/20..01/24/20`:
    //! France `1,5,5`, United States `1,5,10`, Canada `1,4,7`, Taiwan `1,3,3`,
    //! United Kingdom `0,0,2`, Diamond Princess `10,10,61`.

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use epitrack_ingest::{
        build_country_series, build_region_series, parse_live_feed, reconcile_live,
        ColumnSchema, RawTable,
    };
    use std::collections::BTreeMap;

    pub const GLOBAL_CONFIRMED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,France,46.2276,2.2137,1,5,5
California,US,36.1162,-119.6816,0,2,4
Texas,US,31.0545,-97.5635,1,3,6
Ontario,Canada,51.2538,-85.3232,1,3,6
Quebec,Canada,52.9399,-73.5491,0,1,1
,Taiwan*,23.7,121.0,1,3,3
,United Kingdom,55.3781,-3.436,0,0,2
,Diamond Princess,0.0,0.0,10,10,61
";

    pub const GLOBAL_DEATHS_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,France,46.2276,2.2137,0,1,2
California,US,36.1162,-119.6816,0,0,0
Texas,US,31.0545,-97.5635,0,0,1
Ontario,Canada,51.2538,-85.3232,0,0,0
Quebec,Canada,52.9399,-73.5491,0,0,0
,Taiwan*,23.7,121.0,0,0,0
,United Kingdom,55.3781,-3.436,0,0,0
,Diamond Princess,0.0,0.0,0,0,1
";

    pub const GLOBAL_RECOVERED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,France,46.2276,2.2137,0,0,1
,US,37.0902,-95.7129,0,0,0
,Canada,56.1304,-106.3468,0,0,1
,Taiwan*,23.7,121.0,0,1,1
,United Kingdom,55.3781,-3.436,0,0,0
,Diamond Princess,0.0,0.0,0,0,0
";

    pub const US_CONFIRMED_CSV: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,1/22/20,1/23/20,1/24/20
84006037,US,USA,840,6037,Los Angeles,California,US,34.3083,-118.2282,\"Los Angeles, California, US\",0,1,3
84006073,US,USA,840,6073,San Diego,California,US,33.0341,-116.7353,\"San Diego, California, US\",0,1,1
84048201,US,USA,840,48201,Harris,Texas,US,29.8574,-95.3933,\"Harris, Texas, US\",1,3,6
";

    pub const US_DEATHS_CSV: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population,1/22/20,1/23/20,1/24/20
84006037,US,USA,840,6037,Los Angeles,California,US,34.3083,-118.2282,\"Los Angeles, California, US\",10039107,0,0,0
84006073,US,USA,840,6073,San Diego,California,US,33.0341,-116.7353,\"San Diego, California, US\",3338330,0,0,0
84048201,US,USA,840,48201,Harris,Texas,US,29.8574,-95.3933,\"Harris, Texas, US\",4713325,0,0,1
";

    pub const LIVE_FEED_JSON: &str = r#"{
  "regionData": [
    {"country": "France", "totalCases": 5, "newCases": 0, "totalDeaths": 2, "newDeaths": 1,
     "activeCases": 2, "totalRecovered": 1, "seriousCritical": 0},
    {"country": "USA", "totalCases": null, "newCases": null},
    {"country": "Réunion", "totalCases": 3},
    {"country": "Total:", "totalCases": 120, "totalDeaths": 3}
  ],
  "lastUpdatedAtApify": "2020-01-24T23:00:00.000Z"
}"#;

    pub const ISO_TABLE_JSON: &str = r#"[
  {"name": "France", "iso2": "FR", "iso3": "FRA"},
  {"name": "Canada", "iso2": "CA", "iso3": "CAN"},
  {"name": "United Kingdom", "iso2": "GB", "iso3": "GBR"},
  {"name": "United States of America", "iso2": "US", "iso3": "USA"},
  {"name": "Reunion", "iso2": "RE", "iso3": "REU"},
  {"name": "Taiwan, Province of China", "iso2": "TW", "iso3": "TWN"}
]"#;

    pub const POPULATIONS_CSV: &str = "\
Country,iso3,population
France,FRA,65273511
Canada,CAN,37742154
United States,USA,331002651
United Kingdom,GBR,67886011
Taiwan,TWN,23816775
";

    /// Unix time the fixture snapshot claims to be built at.
    pub const BUILT_AT: i64 = 1_579_906_800;

    /// `(source name, body)` for every default source.
    pub fn documents() -> Vec<(&'static str, &'static str)> {
        vec![
            ("confirmed_global", GLOBAL_CONFIRMED_CSV),
            ("deaths_global", GLOBAL_DEATHS_CSV),
            ("recovered_global", GLOBAL_RECOVERED_CSV),
            ("confirmed_us", US_CONFIRMED_CSV),
            ("deaths_us", US_DEATHS_CSV),
            ("live_feed", LIVE_FEED_JSON),
        ]
    }

    pub fn iso_table() -> IsoTable {
        IsoTable::from_json_slice(ISO_TABLE_JSON.as_bytes()).expect("fixture ISO table")
    }

    pub fn resolver() -> Arc<IdentityResolver> {
        Arc::new(IdentityResolver::new(iso_table()))
    }

    pub fn population_source() -> StaticPopulationSource {
        StaticPopulationSource::new([
            ("FRA", 65_273_511.0),
            ("CAN", 37_742_154.0),
            ("USA", 331_002_651.0),
            ("GBR", 67_886_011.0),
            ("TWN", 23_816_775.0),
        ])
    }

    pub fn population_table() -> Arc<PopulationTable> {
        Arc::new(PopulationTable::new(population_source()))
    }

    pub fn built_at() -> DateTime<Utc> {
        Utc.timestamp_opt(BUILT_AT, 0)
            .single()
            .expect("fixture timestamp")
    }

    /// The snapshot a successful pass over the fixture documents produces,
    /// stamped with [`BUILT_AT`].
    pub fn snapshot() -> Snapshot {
        let resolver = resolver();
        let table = |name: &str, body: &str| {
            RawTable::from_csv(name, body.as_bytes()).expect("fixture CSV")
        };

        let mut datasets = BTreeMap::new();
        for (data_type, global, us) in [
            (DataType::Confirmed, GLOBAL_CONFIRMED_CSV, Some(US_CONFIRMED_CSV)),
            (DataType::Deaths, GLOBAL_DEATHS_CSV, Some(US_DEATHS_CSV)),
            (DataType::Recovered, GLOBAL_RECOVERED_CSV, None),
        ] {
            let global = table(&format!("{}_global", data_type), global);
            let dataset = Dataset {
                countries: build_country_series(&global, &ColumnSchema::GLOBAL, &resolver)
                    .expect("fixture countries"),
                regions: build_region_series(&global, &ColumnSchema::GLOBAL, &resolver, false)
                    .expect("fixture regions"),
                us_regions: us.map(|body| {
                    let us = table(&format!("{}_us", data_type), body);
                    build_region_series(&us, &ColumnSchema::US, &resolver, true)
                        .expect("fixture US regions")
                }),
            };
            datasets.insert(data_type, dataset);
        }

        let feed = parse_live_feed(LIVE_FEED_JSON.as_bytes()).expect("fixture feed");
        let live = reconcile_live(feed, &resolver, &datasets, BUILT_AT);
        Snapshot::new(datasets, live, built_at())
    }

    /// A store already holding [`snapshot`].
    pub fn store() -> Arc<SnapshotStore> {
        Arc::new(SnapshotStore::new(snapshot()))
    }

    /// Consecutive daily series starting `01/22/20`.
    pub fn series(values: &[u64]) -> TimeSeries {
        let mut date = DateKey::from_ymd(2020, 1, 22).expect("fixture start date");
        let mut ts = TimeSeries::new();
        for value in values {
            ts.insert(date, *value);
            date = date.succ().expect("fixture date range");
        }
        ts
    }

    pub fn key(raw: &str) -> DateKey {
        raw.parse().expect("fixture date key")
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for epitrack types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_data_type() -> impl Strategy<Value = DataType> {
        prop_oneof![
            Just(DataType::Confirmed),
            Just(DataType::Deaths),
            Just(DataType::Recovered),
        ]
    }

    /// Consecutive daily series of up to `max_len` arbitrary counts.
    pub fn arb_history(max_len: usize) -> impl Strategy<Value = TimeSeries> {
        proptest::collection::vec(0u64..10_000_000, 0..=max_len)
            .prop_map(|values| fixtures::series(&values))
    }

    /// Cumulative (non-decreasing) daily series.
    pub fn arb_cumulative_history(max_len: usize) -> impl Strategy<Value = TimeSeries> {
        proptest::collection::vec(0u64..100_000, 0..=max_len).prop_map(|increments| {
            let mut running = 0u64;
            let values: Vec<u64> = increments
                .into_iter()
                .map(|inc| {
                    running += inc;
                    running
                })
                .collect();
            fixtures::series(&values)
        })
    }

    /// Resolved identity with upper-case codes.
    pub fn arb_resolved_identity() -> impl Strategy<Value = CanonicalIdentity> {
        ("[A-Z][a-z]{2,12}( [A-Z][a-z]{2,10})?", "[A-Z]{2}", "[A-Z]{3}")
            .prop_map(|(name, iso2, iso3)| CanonicalIdentity::new(name, iso2, iso3))
    }

    /// Resolved or unresolved identity.
    pub fn arb_identity() -> impl Strategy<Value = CanonicalIdentity> {
        prop_oneof![
            3 => arb_resolved_identity(),
            1 => "[A-Z][a-z]{2,12}".prop_map(CanonicalIdentity::unresolved),
        ]
    }

    /// `text` with each ASCII letter's case flipped at random.
    pub fn arb_case_variant(text: String) -> impl Strategy<Value = String> {
        let len = text.chars().count();
        proptest::collection::vec(any::<bool>(), len).prop_map(move |flips| {
            text.chars()
                .zip(flips)
                .map(|(c, flip)| {
                    if !flip {
                        c
                    } else if c.is_ascii_uppercase() {
                        c.to_ascii_lowercase()
                    } else {
                        c.to_ascii_uppercase()
                    }
                })
                .collect()
        })
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over [`EpiError`] kinds.

    use super::*;

    pub fn assert_kind<T: std::fmt::Debug>(result: &EpiResult<T>, kind: &str) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {}", e),
            Ok(v) => panic!("Expected {} error, got Ok({:?})", kind, v),
        }
    }

    pub fn assert_country_not_found<T: std::fmt::Debug>(result: &EpiResult<T>) {
        assert_kind(result, "CountryNotFound");
        assert!(result.as_ref().is_err_and(EpiError::is_not_found));
    }

    pub fn assert_region_not_found<T: std::fmt::Debug>(result: &EpiResult<T>) {
        assert_kind(result, "RegionNotFound");
        assert!(result.as_ref().is_err_and(EpiError::is_not_found));
    }

    pub fn assert_derivation_failed<T: std::fmt::Debug>(result: &EpiResult<T>) {
        assert_kind(result, "DerivationFailed");
        assert!(!result.as_ref().is_err_and(EpiError::is_not_found));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_snapshot_totals() {
        let snapshot = fixtures::snapshot();
        let confirmed = snapshot.dataset(DataType::Confirmed).unwrap();
        assert_eq!(
            confirmed.countries.get("United States").unwrap().history,
            fixtures::series(&[1, 5, 10])
        );
        assert_eq!(
            confirmed.countries.get("Taiwan").unwrap().identity,
            CanonicalIdentity::new("Taiwan", "TW", "TWN")
        );
        assert_eq!(confirmed.countries.world_total(), fixtures::series(&[14, 27, 88]));
        assert!(snapshot.dataset(DataType::Recovered).unwrap().us_regions.is_none());
    }

    #[test]
    fn test_fixture_live_rows_are_reconciled() {
        let snapshot = fixtures::snapshot();
        let us = snapshot.live().iter().find(|r| r.iso3 == "USA").unwrap();
        assert_eq!(us.country, "United States");
        assert_eq!(us.total_cases, Some(10));
        assert_eq!(us.new_cases, Some(5));
        assert_eq!(us.total_deaths, Some(1));
        assert_eq!(us.active_cases, Some(9));
        assert_eq!(us.last_update, fixtures::BUILT_AT);

        let reunion = snapshot.live().iter().find(|r| r.country == "Reunion").unwrap();
        assert_eq!(reunion.iso2, "RE");
    }

    #[test]
    fn test_population_fixtures_agree() {
        let parsed = epitrack_storage::CsvPopulationSource::parse(
            fixtures::POPULATIONS_CSV.as_bytes(),
        )
        .unwrap();
        let table = fixtures::population_table();
        for (iso3, population) in parsed {
            assert_eq!(table.population_of(&iso3).unwrap(), population);
        }
    }
}
