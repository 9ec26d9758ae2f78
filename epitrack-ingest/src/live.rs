//! Live counter feed: decoding, identity resolution and reconciliation
//! against the cumulative histories.

use serde::Deserialize;
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

use epitrack_core::{Dataset, DataType, EntitySeries, IngestError, LiveCountry};

use crate::resolver::IdentityResolver;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedDocument {
    region_data: Vec<LiveCountry>,
}

/// Decode the feed document (`{"regionData": [...]}`).
pub fn parse_live_feed(input: &[u8]) -> Result<Vec<LiveCountry>, IngestError> {
    serde_json::from_slice::<FeedDocument>(input)
        .map(|doc| doc.region_data)
        .map_err(|e| IngestError::Reference {
            document: "live_feed".to_string(),
            reason: e.to_string(),
        })
}

/// Compatibility decomposition with every non-ASCII remnant dropped
/// (`"Réunion"` → `"Reunion"`).
pub fn ascii_fold(name: &str) -> String {
    name.nfkd().filter(char::is_ascii).collect()
}

/// Resolve each row's identity, stamp `last_update`, and fill any counter
/// the feed left empty from the cumulative histories.
pub fn reconcile_live(
    rows: Vec<LiveCountry>,
    resolver: &IdentityResolver,
    datasets: &BTreeMap<DataType, Dataset>,
    last_update: i64,
) -> Vec<LiveCountry> {
    rows.into_iter()
        .map(|mut row| {
            row.last_update = last_update;
            if row.is_total_row() {
                row.iso2.clear();
                row.iso3.clear();
                return row;
            }

            let identity = resolver.resolve(&ascii_fold(&row.country));
            row.country = identity.name;
            row.iso2 = identity.iso2;
            row.iso3 = identity.iso3;

            let history_of = |data_type: DataType| {
                datasets
                    .get(&data_type)
                    .and_then(|d| find_entity(d, &row))
            };
            let confirmed = history_of(DataType::Confirmed);
            let deaths = history_of(DataType::Deaths);
            let recovered = history_of(DataType::Recovered);
            let latest = |e: Option<&EntitySeries>| e.and_then(|e| e.history.latest()).map(|(_, c)| c);

            if row.total_cases.is_none() {
                row.total_cases = latest(confirmed);
            }
            if row.total_deaths.is_none() {
                row.total_deaths = latest(deaths);
            }
            if row.total_recovered.is_none() {
                row.total_recovered = latest(recovered);
            }
            if row.new_cases.is_none() {
                row.new_cases = confirmed.and_then(|e| e.history.latest_delta());
            }
            if row.new_deaths.is_none() {
                row.new_deaths = deaths.and_then(|e| e.history.latest_delta());
            }
            if row.active_cases.is_none() {
                row.active_cases = row.total_cases.map(|cases| {
                    cases
                        .saturating_sub(row.total_deaths.unwrap_or(0))
                        .saturating_sub(row.total_recovered.unwrap_or(0))
                });
            }
            row
        })
        .collect()
}

fn find_entity<'a>(dataset: &'a Dataset, row: &LiveCountry) -> Option<&'a EntitySeries> {
    dataset.countries.get(&row.country).or_else(|| {
        if row.iso3.is_empty() {
            None
        } else {
            dataset.countries.find(&row.iso3)
        }
    })
}
