//! Cache read wrapper carrying provenance metadata.

use chrono::{DateTime, Utc};

/// Result of a memoized read.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the value was computed.
    cached_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A value served from a previously computed entry.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    /// A value computed by this call.
    pub fn computed(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_follows_origin() {
        let at = Utc::now();
        let read = CacheRead::from_cache(2, at);
        assert_eq!(*read.value(), 2);
        assert_eq!(read.cached_at(), at);
        assert!(read.was_cache_hit());
        assert!(!CacheRead::computed((), at).was_cache_hit());
    }
}
