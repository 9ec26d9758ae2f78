//! Population Table: iso3 → population, loaded lazily and reloaded on miss.
//!
//! The table is loaded on first use. A lookup miss triggers a reload, after
//! which the lookup is retried once. Reloads are single-flight: callers that
//! missed against the same generation share one reload, and a caller that
//! arrives after someone else already reloaded just retries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use epitrack_core::{EpiResult, PopulationError, StorageError};

/// Something that can produce the full iso3 → population mapping.
pub trait PopulationSource: Send + Sync {
    fn load(&self) -> Result<HashMap<String, f64>, PopulationError>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Population CSV on disk with `iso3` and `population` columns.
#[derive(Debug, Clone)]
pub struct CsvPopulationSource {
    path: PathBuf,
}

impl CsvPopulationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode a population CSV body. Header names are matched case-insensitively;
    /// other columns are ignored.
    pub fn parse(body: &[u8]) -> Result<HashMap<String, f64>, PopulationError> {
        let unavailable = |reason: String| PopulationError::SourceUnavailable { reason };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(body);

        let headers = reader
            .headers()
            .map_err(|e| unavailable(e.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| unavailable(format!("missing column '{}'", name)))
        };
        let iso3_idx = column("iso3")?;
        let population_idx = column("population")?;

        let mut table = HashMap::new();
        for (row_no, record) in reader.records().enumerate() {
            let record = record.map_err(|e| unavailable(e.to_string()))?;
            let iso3 = record.get(iso3_idx).unwrap_or_default();
            if iso3.is_empty() {
                continue;
            }
            let raw = record.get(population_idx).unwrap_or_default();
            let population = raw.parse::<f64>().map_err(|_| {
                unavailable(format!(
                    "row {}: population '{}' for {} is not a number",
                    row_no + 1,
                    raw,
                    iso3
                ))
            })?;
            table.insert(iso3.to_ascii_uppercase(), population);
        }
        Ok(table)
    }
}

impl PopulationSource for CsvPopulationSource {
    fn load(&self) -> Result<HashMap<String, f64>, PopulationError> {
        let body = std::fs::read(&self.path).map_err(|e| PopulationError::SourceUnavailable {
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        Self::parse(&body)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed in-memory mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticPopulationSource {
    entries: HashMap<String, f64>,
}

impl StaticPopulationSource {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(iso3, p)| (iso3.into().to_ascii_uppercase(), p))
                .collect(),
        }
    }
}

impl PopulationSource for StaticPopulationSource {
    fn load(&self) -> Result<HashMap<String, f64>, PopulationError> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[derive(Default)]
struct Loaded {
    /// Bumped on every completed reload; zero means never loaded.
    generation: u64,
    entries: HashMap<String, f64>,
}

/// Lazily loaded population lookup.
pub struct PopulationTable {
    source: Box<dyn PopulationSource>,
    loaded: RwLock<Loaded>,
    reload_gate: Mutex<()>,
}

impl PopulationTable {
    pub fn new(source: impl PopulationSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            loaded: RwLock::new(Loaded::default()),
            reload_gate: Mutex::new(()),
        }
    }

    /// Population for an ISO-3166 alpha-3 code (case-insensitive).
    pub fn population_of(&self, iso3: &str) -> EpiResult<f64> {
        let code = iso3.trim().to_ascii_uppercase();
        let not_found = || PopulationError::NotFound {
            iso3: iso3.to_string(),
        };
        if code.is_empty() {
            return Err(not_found().into());
        }

        let (hit, generation) = self.lookup(&code)?;
        if let Some(population) = hit {
            return Ok(population);
        }

        self.reload_after(generation)?;
        match self.lookup(&code)? {
            (Some(population), _) => Ok(population),
            (None, _) => Err(not_found().into()),
        }
    }

    /// Number of completed loads.
    pub fn generation(&self) -> EpiResult<u64> {
        Ok(self.read()?.generation)
    }

    pub fn len(&self) -> EpiResult<usize> {
        Ok(self.read()?.entries.len())
    }

    fn lookup(&self, code: &str) -> EpiResult<(Option<f64>, u64)> {
        let loaded = self.read()?;
        Ok((loaded.entries.get(code).copied(), loaded.generation))
    }

    /// Reload unless a reload completed since `seen_generation`.
    fn reload_after(&self, seen_generation: u64) -> EpiResult<()> {
        let _gate = self
            .reload_gate
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;

        if self.read()?.generation != seen_generation {
            return Ok(());
        }

        let entries = self.source.load().map_err(|e| {
            tracing::warn!(source = %self.source.describe(), error = %e, "Population reload failed");
            e
        })?;
        let count = entries.len();

        let mut loaded = self
            .loaded
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        loaded.entries = entries;
        loaded.generation += 1;
        tracing::info!(
            source = %self.source.describe(),
            entries = count,
            generation = loaded.generation,
            "Population table loaded"
        );
        Ok(())
    }

    fn read(&self) -> EpiResult<std::sync::RwLockReadGuard<'_, Loaded>> {
        self.loaded
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epitrack_core::EpiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    /// Counts loads and serves whatever entries are currently configured.
    struct CountingSource {
        loads: Arc<AtomicUsize>,
        entries: Arc<Mutex<HashMap<String, f64>>>,
    }

    impl PopulationSource for CountingSource {
        fn load(&self) -> Result<HashMap<String, f64>, PopulationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(self.entries.lock().unwrap().clone())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn counting(
        entries: &[(&str, f64)],
    ) -> (PopulationTable, Arc<AtomicUsize>, Arc<Mutex<HashMap<String, f64>>>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let map = Arc::new(Mutex::new(
            entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        ));
        let table = PopulationTable::new(CountingSource {
            loads: Arc::clone(&loads),
            entries: Arc::clone(&map),
        });
        (table, loads, map)
    }

    #[test]
    fn test_loads_lazily_on_first_use() {
        let (table, loads, _) = counting(&[("FRA", 65_273_511.0)]);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(table.population_of("fra").unwrap(), 65_273_511.0);
        assert_eq!(table.population_of("FRA").unwrap(), 65_273_511.0);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_miss_reloads_and_picks_up_new_entries() {
        let (table, loads, map) = counting(&[("FRA", 1.0)]);
        table.population_of("FRA").unwrap();
        map.lock().unwrap().insert("CAN".to_string(), 2.0);

        assert_eq!(table.population_of("CAN").unwrap(), 2.0);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(table.generation().unwrap(), 2);
    }

    #[test]
    fn test_persistent_miss_is_population_not_found() {
        let (table, _, _) = counting(&[("FRA", 1.0)]);
        let err = table.population_of("XKX").unwrap_err();
        assert_eq!(
            err,
            EpiError::Population(PopulationError::NotFound {
                iso3: "XKX".to_string()
            })
        );
        assert_eq!(table.population_of("").unwrap_err().kind(), "PopulationNotFound");
    }

    #[test]
    fn test_concurrent_misses_share_one_reload() {
        let (table, loads, _) = counting(&[("FRA", 1.0)]);
        let table = Arc::new(table);
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    table.population_of("FRA").unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1.0);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_csv_source_parsing() {
        let body = b"Country,ISO3,Population\nFrance,FRA,65273511\nKosovo,,1800000\nCanada,can,37742154.0\n";
        let table = CsvPopulationSource::parse(body).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["FRA"], 65_273_511.0);
        assert_eq!(table["CAN"], 37_742_154.0);

        let err = CsvPopulationSource::parse(b"iso3,population\nFRA,lots\n").unwrap_err();
        assert!(matches!(err, PopulationError::SourceUnavailable { .. }));
        assert!(CsvPopulationSource::parse(b"iso3,count\nFRA,1\n").is_err());
    }

    #[test]
    fn test_missing_file_is_derivation_failure() {
        let table = PopulationTable::new(CsvPopulationSource::new("/nonexistent/populations.csv"));
        let err = table.population_of("FRA").unwrap_err();
        assert!(matches!(
            err,
            EpiError::Population(PopulationError::SourceUnavailable { .. })
        ));
        assert!(!err.is_not_found());
        assert_eq!(err.kind(), "DerivationFailed");
    }
}
