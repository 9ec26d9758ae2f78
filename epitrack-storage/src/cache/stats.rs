//! Cache usage counters.

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from an existing entry.
    pub hits: u64,
    /// Reads that had to compute.
    pub misses: u64,
    /// Entries currently held (including expired ones not yet swept).
    pub entry_count: u64,
    /// Entries dropped by TTL sweeps or clears.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
