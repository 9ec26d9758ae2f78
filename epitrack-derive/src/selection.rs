//! What part of a dataset a query targets.

use std::fmt;

use epitrack_core::{EpiError, EpiResult};

/// Path segment selecting the world aggregate.
pub const WORLD_SEGMENT: &str = "total";
/// Region segment selecting every subregion of a country.
pub const REGIONS_SEGMENT: &str = "regions";

/// Target of a derived-view query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selection {
    /// Every canonical entity.
    All,
    /// Date-wise sum over every entity.
    World,
    /// One entity matched by name, iso2 or iso3.
    Country(String),
    /// One subregion of a matched country, by case-insensitive label.
    Region { country: String, region: String },
    /// Every subregion of a matched country.
    Regions(String),
}

impl Selection {
    /// Map the `(country, region)` path shape onto a selection:
    /// no segment is [`Selection::All`], `total` is [`Selection::World`] and a
    /// `regions` region segment is [`Selection::Regions`]. A region without a
    /// country is rejected.
    pub fn from_path(country: Option<&str>, region: Option<&str>) -> EpiResult<Self> {
        let selection = match (country, region) {
            (None, None) => Selection::All,
            (None, Some(region)) => {
                return Err(EpiError::derivation(format!(
                    "region '{}' given without a country",
                    region
                )))
            }
            (Some(WORLD_SEGMENT), None) => Selection::World,
            (Some(country), None) => Selection::Country(country.to_string()),
            (Some(country), Some(REGIONS_SEGMENT)) => Selection::Regions(country.to_string()),
            (Some(country), Some(region)) => Selection::Region {
                country: country.to_string(),
                region: region.to_string(),
            },
        };
        Ok(selection)
    }

    /// The country query, for selections that carry one.
    pub fn country(&self) -> Option<&str> {
        match self {
            Selection::Country(c) | Selection::Regions(c) => Some(c),
            Selection::Region { country, .. } => Some(country),
            Selection::All | Selection::World => None,
        }
    }

    pub fn targets_regions(&self) -> bool {
        matches!(self, Selection::Region { .. } | Selection::Regions(_))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::World => f.write_str(WORLD_SEGMENT),
            Selection::Country(c) => write!(f, "{}", c),
            Selection::Region { country, region } => write!(f, "{}/{}", country, region),
            Selection::Regions(c) => write!(f, "{}/{}", c, REGIONS_SEGMENT),
        }
    }
}
