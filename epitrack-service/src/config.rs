//! Service configuration read from `EPITRACK_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use epitrack_core::{ConfigError, DataType};
use epitrack_derive::DEFAULT_WORLD_POPULATION;
use epitrack_ingest::SourceConfig;
use epitrack_storage::CacheConfig;

use crate::jobs::RefreshConfig;
use crate::telemetry::LogFormat;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 1800;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 900;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

const ISO_TABLE_FILE: &str = "iso-3166.json";
const POPULATION_FILE: &str = "populations.csv";

/// Everything the refresh daemon needs to start.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the persisted snapshot documents.
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub world_population: f64,
    pub iso_table_path: PathBuf,
    pub population_path: PathBuf,
    pub sources: SourceConfig,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `EPITRACK_DATA_DIR`: persisted documents directory (default: `./data`)
    /// - `EPITRACK_REFRESH_INTERVAL_SECS`: seconds between ingestion passes (default: 1800)
    /// - `EPITRACK_CACHE_TTL_SECS`: derived result lifetime (default: 900)
    /// - `EPITRACK_CACHE_MAX_ENTRIES`: entries before expired ones are swept (default: 10000)
    /// - `EPITRACK_WORLD_POPULATION`: divisor of world proportions (default: 7794798739)
    /// - `EPITRACK_ISO_TABLE_PATH`: ISO-3166 document (default: `<data_dir>/iso-3166.json`)
    /// - `EPITRACK_POPULATION_PATH`: population CSV (default: `<data_dir>/populations.csv`)
    /// - `EPITRACK_FETCH_TIMEOUT_SECS`: per-request upstream timeout (default: 60)
    /// - `EPITRACK_SOURCE_CONFIRMED_GLOBAL`, `EPITRACK_SOURCE_DEATHS_GLOBAL`,
    ///   `EPITRACK_SOURCE_RECOVERED_GLOBAL`, `EPITRACK_SOURCE_CONFIRMED_US`,
    ///   `EPITRACK_SOURCE_DEATHS_US`, `EPITRACK_SOURCE_LIVE_FEED`: upstream URLs
    /// - `EPITRACK_LOG_FORMAT`: `json` or `pretty` (default: json)
    ///
    /// Unparseable values fall back to their defaults; [`ServiceConfig::validate`]
    /// rejects values that parse but make no sense.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("EPITRACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let refresh_interval = Duration::from_secs(
            lookup("EPITRACK_REFRESH_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        );

        let cache_ttl = Duration::from_secs(
            lookup("EPITRACK_CACHE_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
        );

        let cache_max_entries = lookup("EPITRACK_CACHE_MAX_ENTRIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);

        let world_population = lookup("EPITRACK_WORLD_POPULATION")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WORLD_POPULATION);

        let iso_table_path = lookup("EPITRACK_ISO_TABLE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(ISO_TABLE_FILE));

        let population_path = lookup("EPITRACK_POPULATION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(POPULATION_FILE));

        let timeout = Duration::from_secs(
            lookup("EPITRACK_FETCH_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        );

        let mut sources = SourceConfig::new().with_timeout(timeout);
        for data_type in DataType::ALL {
            let upper = data_type.as_str().to_uppercase();
            if let Some(url) = lookup(&format!("EPITRACK_SOURCE_{}_GLOBAL", upper)) {
                sources = sources.with_global(data_type, url);
            }
            if let Some(url) = lookup(&format!("EPITRACK_SOURCE_{}_US", upper)) {
                sources = sources.with_us(data_type, url);
            }
        }
        if let Some(url) = lookup("EPITRACK_SOURCE_LIVE_FEED") {
            sources = sources.with_live_feed(url);
        }

        let log_format = lookup("EPITRACK_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            data_dir,
            refresh_interval,
            cache_ttl,
            cache_max_entries,
            world_population,
            iso_table_path,
            population_path,
            sources,
            log_format,
        }
    }

    /// Reject values that parsed but cannot drive the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval".to_string(),
                value: "0".to_string(),
                reason: "refresh interval must be positive".to_string(),
            });
        }
        if !self.world_population.is_finite() || self.world_population <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "world_population".to_string(),
                value: self.world_population.to_string(),
                reason: "world population must be a positive number".to_string(),
            });
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_max_entries".to_string(),
                value: "0".to_string(),
                reason: "cache must hold at least one entry".to_string(),
            });
        }
        if self.sources.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "fetch_timeout".to_string(),
                value: "0".to_string(),
                reason: "fetch timeout must be positive".to_string(),
            });
        }
        for source in [
            &self.sources.confirmed_global,
            &self.sources.deaths_global,
            &self.sources.recovered_global,
            &self.sources.confirmed_us,
            &self.sources.deaths_us,
            &self.sources.live_feed,
        ] {
            if source.url.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("source url for {}", source.name),
                });
            }
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(self.cache_ttl)
            .with_max_entries(self.cache_max_entries)
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval: self.refresh_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.world_population, DEFAULT_WORLD_POPULATION);
        assert_eq!(config.iso_table_path, PathBuf::from("./data").join("iso-3166.json"));
        assert_eq!(config.population_path, PathBuf::from("./data").join("populations.csv"));
        assert_eq!(config.sources, SourceConfig::new());
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("EPITRACK_DATA_DIR", "/var/lib/epitrack"),
            ("EPITRACK_REFRESH_INTERVAL_SECS", "60"),
            ("EPITRACK_CACHE_TTL_SECS", "5"),
            ("EPITRACK_WORLD_POPULATION", "8000000000"),
            ("EPITRACK_SOURCE_DEATHS_US", "http://mirror/deaths_us.csv"),
            ("EPITRACK_SOURCE_LIVE_FEED", "http://mirror/live.json"),
            ("EPITRACK_LOG_FORMAT", "pretty"),
        ]);
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.cache_config().entry_ttl, Duration::from_secs(5));
        assert_eq!(config.world_population, 8_000_000_000.0);
        assert_eq!(
            config.iso_table_path,
            PathBuf::from("/var/lib/epitrack").join("iso-3166.json")
        );
        assert_eq!(config.sources.deaths_us.url, "http://mirror/deaths_us.csv");
        assert_eq!(config.sources.live_feed.url, "http://mirror/live.json");
        assert_eq!(config.sources.confirmed_us, SourceConfig::new().confirmed_us);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("EPITRACK_REFRESH_INTERVAL_SECS", "soon"),
            ("EPITRACK_LOG_FORMAT", "xml"),
        ]);
        assert_eq!(config.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        let zero_interval = config_from(&[("EPITRACK_REFRESH_INTERVAL_SECS", "0")]);
        assert!(matches!(
            zero_interval.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "refresh_interval"
        ));

        let negative_world = config_from(&[("EPITRACK_WORLD_POPULATION", "-1")]);
        assert!(negative_world.validate().is_err());

        let blank_source = config_from(&[("EPITRACK_SOURCE_CONFIRMED_GLOBAL", " ")]);
        assert!(matches!(
            blank_source.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }
}
