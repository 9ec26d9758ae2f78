//! Live per-country counters from the third-party snapshot feed.

use serde::{Deserialize, Serialize};

use crate::CanonicalIdentity;

/// One row of the "all current" document.
///
/// Counters the feed left empty are `None` until reconciled against the
/// cumulative histories. Feed fields this type does not model are carried
/// through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveCountry {
    pub country: String,
    #[serde(default)]
    pub total_cases: Option<u64>,
    #[serde(default)]
    pub new_cases: Option<i64>,
    #[serde(default)]
    pub total_deaths: Option<u64>,
    #[serde(default)]
    pub new_deaths: Option<i64>,
    #[serde(default)]
    pub active_cases: Option<u64>,
    #[serde(default)]
    pub total_recovered: Option<u64>,
    #[serde(default)]
    pub iso2: String,
    #[serde(default)]
    pub iso3: String,
    #[serde(default)]
    pub last_update: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LiveCountry {
    /// Row label the feed uses for its grand total.
    pub const TOTAL_ROW: &'static str = "Total:";

    pub fn is_total_row(&self) -> bool {
        self.country == Self::TOTAL_ROW
    }

    pub fn identity(&self) -> CanonicalIdentity {
        CanonicalIdentity::new(self.country.clone(), self.iso2.clone(), self.iso3.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_feed_row_and_keeps_extra_counters() {
        let row: LiveCountry = serde_json::from_value(serde_json::json!({
            "country": "Italy",
            "totalCases": 100,
            "newCases": null,
            "totalDeaths": 4,
            "seriousCritical": 2
        }))
        .unwrap();
        assert_eq!(row.total_cases, Some(100));
        assert_eq!(row.new_cases, None);
        assert_eq!(row.extra.get("seriousCritical"), Some(&serde_json::json!(2)));

        let out = serde_json::to_value(&row).unwrap();
        assert_eq!(out["seriousCritical"], serde_json::json!(2));
        assert_eq!(out["lastUpdate"], serde_json::json!(0));
    }
}
