//! Canonical time-series containers and their persisted JSON shapes.
//!
//! Country documents are `{name: {history, iso2, iso3}}`, region documents are
//! `{name: {regions: {region: {history}}, iso2, iso3}}`. The entity name lives
//! only in the map key and is restored into the identity when decoding.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CanonicalIdentity, DateKey};

/// Cumulative counts keyed by date, iterated in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries(BTreeMap<DateKey, u64>);

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `date`, returning the previous one.
    pub fn insert(&mut self, date: DateKey, count: u64) -> Option<u64> {
        self.0.insert(date, count)
    }

    /// Add `count` into the value already stored for `date` (zero if absent).
    pub fn add(&mut self, date: DateKey, count: u64) {
        let slot = self.0.entry(date).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Date-wise sum of `other` into `self`.
    pub fn accumulate(&mut self, other: &TimeSeries) {
        for (date, count) in other.iter() {
            self.add(date, count);
        }
    }

    pub fn get(&self, date: &DateKey) -> Option<u64> {
        self.0.get(date).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateKey, u64)> + '_ {
        self.0.iter().map(|(d, c)| (*d, *c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most recent date and its value.
    pub fn latest(&self) -> Option<(DateKey, u64)> {
        self.0.iter().next_back().map(|(d, c)| (*d, *c))
    }

    /// Difference between the two most recent values (first value if only one).
    pub fn latest_delta(&self) -> Option<i64> {
        let mut rev = self.0.values().rev();
        let last = *rev.next()?;
        let prev = rev.next().copied().unwrap_or(0);
        Some(last as i64 - prev as i64)
    }

    pub fn as_map(&self) -> &BTreeMap<DateKey, u64> {
        &self.0
    }
}

impl FromIterator<(DateKey, u64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (DateKey, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One canonical country and its cumulative history for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySeries {
    pub identity: CanonicalIdentity,
    pub history: TimeSeries,
}

/// One canonical country and the histories of its subregions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSeries {
    pub identity: CanonicalIdentity,
    pub regions: BTreeMap<String, TimeSeries>,
}

impl RegionSeries {
    /// Subregion history by case-insensitive label.
    pub fn region(&self, label: &str) -> Option<(&str, &TimeSeries)> {
        self.regions
            .iter()
            .find(|(name, _)| crate::identity::eq_ignore_case(label, name))
            .map(|(name, series)| (name.as_str(), series))
    }
}

/// All country series of one dataset, keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountrySeriesSet {
    entities: BTreeMap<String, EntitySeries>,
}

impl CountrySeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&EntitySeries> {
        self.entities.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EntitySeries> {
        self.entities.get_mut(name)
    }

    /// Insert or replace the series stored under its identity's name.
    pub fn insert(&mut self, series: EntitySeries) {
        self.entities.insert(series.identity.name.clone(), series);
    }

    /// First entity whose identity matches `query`.
    pub fn find(&self, query: &str) -> Option<&EntitySeries> {
        self.entities.values().find(|e| e.identity.matches(query))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySeries> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntitySeries> {
        self.entities.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Date-wise sum over every entity.
    pub fn world_total(&self) -> TimeSeries {
        let mut total = TimeSeries::new();
        for entity in self.entities.values() {
            total.accumulate(&entity.history);
        }
        total
    }
}

/// All region series of one dataset, keyed by canonical country name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSeriesSet {
    countries: BTreeMap<String, RegionSeries>,
}

impl RegionSeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RegionSeries> {
        self.countries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RegionSeries> {
        self.countries.get_mut(name)
    }

    pub fn insert(&mut self, series: RegionSeries) {
        self.countries.insert(series.identity.name.clone(), series);
    }

    pub fn find(&self, query: &str) -> Option<&RegionSeries> {
        self.countries.values().find(|c| c.identity.matches(query))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionSeries> {
        self.countries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegionSeries> {
        self.countries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

// ============================================================================
// PERSISTED SHAPES
// ============================================================================

#[derive(Serialize, Deserialize)]
struct EntityDoc<T> {
    #[serde(flatten)]
    body: T,
    #[serde(default)]
    iso2: String,
    #[serde(default)]
    iso3: String,
}

#[derive(Serialize, Deserialize)]
struct HistoryBody {
    history: TimeSeries,
}

#[derive(Serialize, Deserialize)]
struct RegionsBody {
    regions: BTreeMap<String, HistoryBody>,
}

impl Serialize for CountrySeriesSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entities.iter().map(|(name, e)| {
            (
                name,
                EntityDoc {
                    body: HistoryBody {
                        history: e.history.clone(),
                    },
                    iso2: e.identity.iso2.clone(),
                    iso3: e.identity.iso3.clone(),
                },
            )
        }))
    }
}

impl<'de> Deserialize<'de> for CountrySeriesSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, EntityDoc<HistoryBody>>::deserialize(deserializer)?;
        let mut set = Self::new();
        for (name, doc) in raw {
            set.insert(EntitySeries {
                identity: CanonicalIdentity::new(name, doc.iso2, doc.iso3),
                history: doc.body.history,
            });
        }
        Ok(set)
    }
}

impl Serialize for RegionSeriesSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.countries.iter().map(|(name, c)| {
            let regions = c
                .regions
                .iter()
                .map(|(label, history)| {
                    (
                        label.clone(),
                        HistoryBody {
                            history: history.clone(),
                        },
                    )
                })
                .collect();
            (
                name,
                EntityDoc {
                    body: RegionsBody { regions },
                    iso2: c.identity.iso2.clone(),
                    iso3: c.identity.iso3.clone(),
                },
            )
        }))
    }
}

impl<'de> Deserialize<'de> for RegionSeriesSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, EntityDoc<RegionsBody>>::deserialize(deserializer)?;
        let mut set = Self::new();
        for (name, doc) in raw {
            set.insert(RegionSeries {
                identity: CanonicalIdentity::new(name, doc.iso2, doc.iso3),
                regions: doc
                    .body
                    .regions
                    .into_iter()
                    .map(|(label, body)| (label, body.history))
                    .collect(),
            });
        }
        Ok(set)
    }
}
