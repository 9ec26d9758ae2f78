//! View kinds and the shapes derived results are returned in.
//!
//! Every per-series value serializes as an object whose single data field is
//! named after the view (`history`, `proportion`, `daily`, `proportion-daily`),
//! optionally followed by `iso2`/`iso3` and the canonical `name`.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use epitrack_core::{CanonicalIdentity, DateKey, EpiError};

/// Placeholder reported for entities a population-based view cannot cover.
pub const UNSUPPORTED_PLACEHOLDER: &str = "This region doesn't work with this function atm";

/// Which derivation to apply to a cumulative series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKind {
    History,
    Proportion,
    Daily,
    ProportionDaily,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::History,
        ViewKind::Proportion,
        ViewKind::Daily,
        ViewKind::ProportionDaily,
    ];

    /// Field name of the data in the serialized output.
    pub fn key(&self) -> &'static str {
        match self {
            ViewKind::History => "history",
            ViewKind::Proportion => "proportion",
            ViewKind::Daily => "daily",
            ViewKind::ProportionDaily => "proportion-daily",
        }
    }

    /// Whether the view divides by a population.
    pub fn needs_population(&self) -> bool {
        matches!(self, ViewKind::Proportion | ViewKind::ProportionDaily)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ViewKind {
    type Err = EpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EpiError::derivation(format!("unknown view '{}'", s)))
    }
}

/// The data part of one derived series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewValues {
    Counts(BTreeMap<DateKey, u64>),
    Deltas(BTreeMap<DateKey, i64>),
    Formatted(BTreeMap<DateKey, String>),
    Unsupported(String),
}

impl ViewValues {
    pub fn unsupported() -> Self {
        ViewValues::Unsupported(UNSUPPORTED_PLACEHOLDER.to_string())
    }

    pub fn len(&self) -> usize {
        match self {
            ViewValues::Counts(m) => m.len(),
            ViewValues::Deltas(m) => m.len(),
            ViewValues::Formatted(m) => m.len(),
            ViewValues::Unsupported(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One derived series plus whatever identity fields the selection echoes.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub kind: ViewKind,
    pub values: ViewValues,
    /// `(iso2, iso3)` when the output echoes codes.
    pub codes: Option<(String, String)>,
    /// Canonical name, echoed for single-country selections.
    pub name: Option<String>,
}

impl SeriesView {
    /// Bare series without identity fields (world totals, subregions).
    pub fn bare(kind: ViewKind, values: ViewValues) -> Self {
        Self {
            kind,
            values,
            codes: None,
            name: None,
        }
    }

    /// Series echoing the entity's codes.
    pub fn with_codes(kind: ViewKind, values: ViewValues, identity: &CanonicalIdentity) -> Self {
        Self {
            kind,
            values,
            codes: Some((identity.iso2.clone(), identity.iso3.clone())),
            name: None,
        }
    }

    /// Series echoing the entity's codes and canonical name.
    pub fn named(kind: ViewKind, values: ViewValues, identity: &CanonicalIdentity) -> Self {
        Self {
            name: Some(identity.name.clone()),
            ..Self::with_codes(kind, values, identity)
        }
    }
}

impl Serialize for SeriesView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + self.codes.as_ref().map_or(0, |_| 2) + self.name.as_ref().map_or(0, |_| 1);
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(self.kind.key(), &self.values)?;
        if let Some((iso2, iso3)) = &self.codes {
            map.serialize_entry("iso2", iso2)?;
            map.serialize_entry("iso3", iso3)?;
        }
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        map.end()
    }
}

/// A derived result in one of the selection shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Derived {
    /// Every canonical entity, keyed by name.
    All(BTreeMap<String, SeriesView>),
    /// Date-wise sum over every entity.
    World(SeriesView),
    /// One matched country.
    Country(SeriesView),
    /// One subregion of a matched country.
    Region(SeriesView),
    /// Every subregion of a matched country, keyed by label.
    Regions(BTreeMap<String, SeriesView>),
}

impl Derived {
    /// Single-series results; `None` for the keyed shapes.
    pub fn series(&self) -> Option<&SeriesView> {
        match self {
            Derived::World(s) | Derived::Country(s) | Derived::Region(s) => Some(s),
            Derived::All(_) | Derived::Regions(_) => None,
        }
    }

    /// Keyed results; `None` for the single-series shapes.
    pub fn entries(&self) -> Option<&BTreeMap<String, SeriesView>> {
        match self {
            Derived::All(m) | Derived::Regions(m) => Some(m),
            _ => None,
        }
    }
}
