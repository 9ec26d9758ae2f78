//! Canonical entity identities and the single lookup rule applied to them.

use serde::{Deserialize, Serialize};

/// A country after identity resolution.
///
/// `iso2`/`iso3` are either both set or both the empty-string sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub name: String,
    pub iso2: String,
    pub iso3: String,
}

impl CanonicalIdentity {
    /// Identity with both codes resolved. Blank codes collapse to the sentinel pair.
    pub fn new(name: impl Into<String>, iso2: impl Into<String>, iso3: impl Into<String>) -> Self {
        let iso2 = iso2.into();
        let iso3 = iso3.into();
        if iso2.trim().is_empty() || iso3.trim().is_empty() {
            return Self::unresolved(name);
        }
        Self {
            name: name.into(),
            iso2,
            iso3,
        }
    }

    /// Identity with no known ISO codes.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            iso2: String::new(),
            iso3: String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.iso3.is_empty()
    }

    /// True iff `query` case-insensitively equals the name, iso2 or iso3.
    ///
    /// Empty fields never match, so an unresolved identity cannot be selected
    /// through its sentinel codes.
    pub fn matches(&self, query: &str) -> bool {
        [&self.name, &self.iso2, &self.iso3]
            .into_iter()
            .any(|field| eq_ignore_case(query, field))
    }
}

/// Case-insensitive equality used for every user-supplied lookup.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn taiwan() -> CanonicalIdentity {
        CanonicalIdentity::new("Taiwan", "TW", "TWN")
    }

    #[test]
    fn test_matches_any_field() {
        let id = taiwan();
        assert!(id.matches("taiwan"));
        assert!(id.matches("tw"));
        assert!(id.matches("TWN"));
        assert!(!id.matches("Thailand"));
    }

    #[test]
    fn test_unicode_names_match_case_insensitively() {
        let id = CanonicalIdentity::new("Côte d'Ivoire", "CI", "CIV");
        assert!(id.matches("CÔTE D'IVOIRE"));
    }

    #[test]
    fn test_unresolved_sentinel_never_matches_empty_query() {
        let id = CanonicalIdentity::unresolved("Diamond Princess");
        assert!(!id.is_resolved());
        assert!(!id.matches(""));
        assert!(id.matches("diamond princess"));
    }

    #[test]
    fn test_half_resolved_codes_collapse_to_sentinel() {
        let id = CanonicalIdentity::new("Kosovo", "XK", "");
        assert_eq!(id.iso2, "");
        assert_eq!(id.iso3, "");
    }

    proptest! {
        #[test]
        fn prop_matching_ignores_case(
            name in "[A-Za-z][A-Za-z ]{0,20}[A-Za-z]",
            iso2 in "[A-Z]{2}",
            iso3 in "[A-Z]{3}",
            pick in 0usize..3,
            upper in any::<bool>(),
        ) {
            let id = CanonicalIdentity::new(name.clone(), iso2.clone(), iso3.clone());
            let target = [name, iso2, iso3][pick].clone();
            let query = if upper { target.to_uppercase() } else { target.to_lowercase() };
            prop_assert!(id.matches(&query));
        }
    }
}
