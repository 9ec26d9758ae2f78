//! Identity resolution: raw upstream labels to canonical `(name, iso2, iso3)`.
//!
//! Lookup order is alias table (exact), then the ISO-3166 reference table
//! (case-insensitive on name), then the unresolved sentinel.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use epitrack_core::{CanonicalIdentity, IngestError};

/// Known inconsistent spellings, keyed by the exact raw label.
static ALIASES: Lazy<HashMap<&'static str, CanonicalIdentity>> = Lazy::new(|| {
    let united_states = CanonicalIdentity::new("United States", "US", "USA");
    let united_kingdom = CanonicalIdentity::new("United Kingdom", "GB", "GBR");
    HashMap::from([
        ("US", united_states.clone()),
        ("USA", united_states),
        ("UK", united_kingdom.clone()),
        ("United Kingdom", united_kingdom),
        ("Taiwan*", CanonicalIdentity::new("Taiwan", "TW", "TWN")),
        ("Syria", CanonicalIdentity::new("Syria", "SY", "SYR")),
    ])
});

/// Exact alias lookup.
pub fn alias(raw: &str) -> Option<&'static CanonicalIdentity> {
    ALIASES.get(raw)
}

/// Canonical identity of the United States, whose subregions come from a
/// dedicated source.
pub fn united_states() -> &'static CanonicalIdentity {
    &ALIASES["US"]
}

#[derive(Debug, Deserialize)]
struct IsoEntry {
    name: String,
    #[serde(default)]
    iso2: String,
    #[serde(default)]
    iso3: String,
}

/// ISO-3166 reference table indexed by lowercased country name.
#[derive(Debug, Clone, Default)]
pub struct IsoTable {
    by_name: HashMap<String, (String, String)>,
}

impl IsoTable {
    /// Decode the reference document: a JSON array of `{name, iso2, iso3}`.
    pub fn from_json_slice(input: &[u8]) -> Result<Self, IngestError> {
        let entries: Vec<IsoEntry> =
            serde_json::from_slice(input).map_err(|e| IngestError::Reference {
                document: "iso-3166".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_iso_entries(entries))
    }

    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::Reference {
            document: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_slice(&bytes)
    }

    /// `(iso2, iso3)` for a case-insensitive name match.
    pub fn codes(&self, name: &str) -> Option<(&str, &str)> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|(iso2, iso3)| (iso2.as_str(), iso3.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn from_iso_entries(entries: impl IntoIterator<Item = IsoEntry>) -> Self {
        let mut by_name = HashMap::new();
        for entry in entries {
            // first entry wins on duplicate names
            by_name
                .entry(entry.name.trim().to_lowercase())
                .or_insert((entry.iso2, entry.iso3));
        }
        Self { by_name }
    }

    /// Build from `(name, iso2, iso3)` triples.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        Self::from_iso_entries(entries.into_iter().map(|(name, iso2, iso3)| IsoEntry {
            name: name.to_string(),
            iso2: iso2.to_string(),
            iso3: iso3.to_string(),
        }))
    }
}

/// Maps raw labels from any upstream source to canonical identities.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    iso: IsoTable,
}

impl IdentityResolver {
    pub fn new(iso: IsoTable) -> Self {
        Self { iso }
    }

    pub fn iso_table(&self) -> &IsoTable {
        &self.iso
    }

    pub fn resolve(&self, raw: &str) -> CanonicalIdentity {
        if let Some(identity) = alias(raw) {
            return identity.clone();
        }
        match self.iso.codes(raw) {
            Some((iso2, iso3)) => CanonicalIdentity::new(raw, iso2, iso3),
            None => CanonicalIdentity::unresolved(raw),
        }
    }

    /// Fill the codes of an unresolved identity from its canonical name.
    pub fn augment(&self, identity: &mut CanonicalIdentity) {
        if identity.is_resolved() {
            return;
        }
        let resolved = self.resolve(&identity.name);
        identity.iso2 = resolved.iso2;
        identity.iso3 = resolved.iso3;
    }
}
